use std::fmt;

/// Number of numeric parameters a form can carry.
pub const MAX_FORM_PARAMS: usize = 3;

/// Unit tag attached to every numeric value.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormType {
    #[default]
    Linear = 0,
    Control,
    Frequency,
    Note,
    Db,
    Seconds,
    Beats,
    Samples,
    Oscillator,
}

impl FormType {
    pub const COUNT: usize = 9;

    pub const ALL: [FormType; FormType::COUNT] = [
        FormType::Linear,
        FormType::Control,
        FormType::Frequency,
        FormType::Note,
        FormType::Db,
        FormType::Seconds,
        FormType::Beats,
        FormType::Samples,
        FormType::Oscillator,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FormType::Linear => "lin",
            FormType::Control => "control",
            FormType::Frequency => "freq",
            FormType::Note => "note",
            FormType::Db => "db",
            FormType::Seconds => "secs",
            FormType::Beats => "beats",
            FormType::Samples => "samples",
            FormType::Oscillator => "osc",
        }
    }

    pub fn from_name(name: &str) -> Option<FormType> {
        FormType::ALL.iter().copied().find(|form| form.name() == name)
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A form tag with its parameters, as stored at runtime.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Form {
    pub ty: FormType,
    pub params: [f32; MAX_FORM_PARAMS],
}

impl Form {
    pub const fn new(ty: FormType) -> Self {
        Self {
            ty,
            params: [0.0; MAX_FORM_PARAMS],
        }
    }

    pub fn with_params(ty: FormType, params: &[f32]) -> Self {
        let mut form = Self::new(ty);
        for (slot, value) in form.params.iter_mut().zip(params) {
            *slot = *value;
        }
        form
    }
}

impl From<FormType> for Form {
    fn from(ty: FormType) -> Self {
        Form::new(ty)
    }
}
