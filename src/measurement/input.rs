use crate::error::ParseError;

/// One parsed operator line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    /// A bare number.
    Set(f64),
    /// A number prefixed with `+`.
    Add(f64),
}

impl Input {
    pub fn value(&self) -> f64 {
        match *self {
            Self::Set(value) | Self::Add(value) => value,
        }
    }

    /// Parses `x` or `+x`. Surrounding whitespace is ignored, NaN is not
    /// a value.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let text = raw.trim();
        let (is_add, number) = match text.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let value = number
            .parse::<f64>()
            .ok()
            .filter(|value| !value.is_nan())
            .ok_or_else(|| ParseError::new(raw))?;

        Ok(if is_add {
            Self::Add(value)
        } else {
            Self::Set(value)
        })
    }
}
