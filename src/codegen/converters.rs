use crate::error::SourceRange;
use crate::values::{Form, FormType, Num};

use super::ir::{ConversionTable, Function, LaneFn};
use super::TimeBase;

const A4_NOTE: f32 = 69.0;
const A4_FREQUENCY: f32 = 440.0;

#[inline]
fn note_to_frequency(note: f32) -> f32 {
    A4_FREQUENCY * 2f32.powf((note - A4_NOTE) / 12.0)
}

#[inline]
fn frequency_to_note(freq: f32) -> f32 {
    A4_NOTE + 12.0 * (freq / A4_FREQUENCY).log2()
}

#[inline]
fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[inline]
fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.abs().log10()
}

fn identity(x: f32, _: &TimeBase) -> f32 {
    x
}

/// Lane conversion from `from` to `to`. Pairs without a meaningful mapping
/// pass the value through unchanged.
fn lane_fn(from: FormType, to: FormType) -> LaneFn {
    use FormType::*;

    if from == to {
        return identity;
    }

    match to {
        Linear => match from {
            Db => |x, _| db_to_amplitude(x),
            _ => identity,
        },
        Control => match from {
            Oscillator => |x, _| (x + 1.0) * 0.5,
            Db => |x, _| db_to_amplitude(x),
            _ => identity,
        },
        Db => match from {
            Linear | Control | Oscillator => |x, _| amplitude_to_db(x),
            _ => identity,
        },
        Frequency => match from {
            Note => |x, _| note_to_frequency(x),
            Seconds => |x, _| 1.0 / x,
            Beats => |x, t| t.beats_per_second() / x,
            Samples => |x, t| t.sample_rate / x,
            _ => identity,
        },
        Note => match from {
            Frequency => |x, _| frequency_to_note(x),
            Seconds => |x, _| frequency_to_note(1.0 / x),
            Beats => |x, t| frequency_to_note(t.beats_per_second() / x),
            Samples => |x, t| frequency_to_note(t.sample_rate / x),
            _ => identity,
        },
        Seconds => match from {
            Beats => |x, t| x / t.beats_per_second(),
            Samples => |x, t| x / t.sample_rate,
            Frequency => |x, _| 1.0 / x,
            Note => |x, _| 1.0 / note_to_frequency(x),
            _ => identity,
        },
        Beats => match from {
            Seconds => |x, t| x * t.beats_per_second(),
            Samples => |x, t| x / t.sample_rate * t.beats_per_second(),
            Frequency => |x, t| t.beats_per_second() / x,
            Note => |x, t| t.beats_per_second() / note_to_frequency(x),
            _ => identity,
        },
        Samples => match from {
            Seconds => |x, t| x * t.sample_rate,
            Beats => |x, t| x / t.beats_per_second() * t.sample_rate,
            Frequency => |x, t| t.sample_rate / x,
            Note => |x, t| t.sample_rate / note_to_frequency(x),
            _ => identity,
        },
        Oscillator => match from {
            Control => |x, _| x * 2.0 - 1.0,
            _ => identity,
        },
    }
}

/// Converts numbers of any form into one destination form.
///
/// The source form is only known when the generated code runs, so the
/// converter carries a table with one lane function per source form and the
/// generated `Convert` instruction dispatches on the value's form register.
#[derive(Clone, Debug)]
pub struct Converter {
    to: FormType,
    table: ConversionTable,
}

impl Converter {
    pub fn new(to: FormType) -> Self {
        Self {
            to,
            table: ConversionTable(FormType::ALL.map(|from| lane_fn(from, to))),
        }
    }

    pub fn table(&self) -> &ConversionTable {
        &self.table
    }

    /// Emits the conversion of `value`. Active flag and constness are kept.
    pub fn call(&self, function: &mut Function, value: &Num, range: SourceRange) -> Num {
        let vec = function.convert(value.vec, value.form, self.table);
        let form = function.const_form(Form::new(self.to));
        Num {
            vec,
            form,
            active: value.active,
            is_const: value.is_const,
            range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn convert(from: FormType, to: FormType, x: f32) -> f32 {
        Converter::new(to).table().apply(from, x, &TimeBase::default())
    }

    #[test]
    fn test_note_frequency() {
        assert_approx_eq!(f32, convert(FormType::Note, FormType::Frequency, 69.0), 440.0, epsilon = 1e-3);
        assert_approx_eq!(f32, convert(FormType::Note, FormType::Frequency, 81.0), 880.0, epsilon = 1e-3);
        assert_approx_eq!(f32, convert(FormType::Frequency, FormType::Note, 220.0), 57.0, epsilon = 1e-4);
    }

    #[test]
    fn test_time_forms() {
        // 120 bpm is two beats per second
        assert_approx_eq!(f32, convert(FormType::Beats, FormType::Seconds, 4.0), 2.0, epsilon = 1e-6);
        assert_approx_eq!(f32, convert(FormType::Seconds, FormType::Samples, 0.5), 22050.0, epsilon = 1e-2);
        assert_approx_eq!(f32, convert(FormType::Samples, FormType::Beats, 44100.0), 2.0, epsilon = 1e-6);
        assert_approx_eq!(f32, convert(FormType::Seconds, FormType::Frequency, 0.25), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_amplitude_forms() {
        assert_approx_eq!(f32, convert(FormType::Db, FormType::Linear, 0.0), 1.0, epsilon = 1e-6);
        assert_approx_eq!(f32, convert(FormType::Db, FormType::Linear, -20.0), 0.1, epsilon = 1e-6);
        assert_approx_eq!(f32, convert(FormType::Linear, FormType::Db, 0.1), -20.0, epsilon = 1e-4);
        assert_approx_eq!(f32, convert(FormType::Oscillator, FormType::Control, -1.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unrelated_forms_pass_through() {
        assert_eq!(convert(FormType::Beats, FormType::Linear, 3.5), 3.5);
        assert_eq!(convert(FormType::Note, FormType::Db, 60.0), 60.0);
        assert_eq!(convert(FormType::Samples, FormType::Samples, 12.0), 12.0);
    }
}
