use super::form::FormType;

/// A stored numeric value: two lanes plus a unit tag.
///
/// This is what a number control holds in the model and what constant value
/// groups bake into the module.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NumValue {
    pub left: f32,
    pub right: f32,
    pub form: FormType,
}

impl NumValue {
    pub const fn new(left: f32, right: f32, form: FormType) -> Self {
        Self { left, right, form }
    }

    pub const fn splat(value: f32, form: FormType) -> Self {
        Self::new(value, value, form)
    }

    pub fn is_nan(&self) -> bool {
        self.left.is_nan() || self.right.is_nan()
    }

    /// Both lanes zero with the default form.
    pub fn is_degenerate(&self) -> bool {
        self.left == 0.0 && self.right == 0.0 && self.form == FormType::Linear
    }

    /// Whether this value is worth baking into a module as a constant default.
    pub fn is_constant_default(&self) -> bool {
        !self.is_degenerate() && !self.is_nan()
    }

    pub fn lanes(&self) -> [f32; 2] {
        [self.left, self.right]
    }
}
