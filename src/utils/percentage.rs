use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || !value.is_finite() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` covered by `value`, capped at 100%.
pub fn minutes_percentage(value: f64, whole: f64) -> Percentage {
    if whole <= 0. {
        return Percentage(100.);
    }
    Percentage::new_opt((value / whole * 100.).min(100.)).unwrap_or(Percentage(0.))
}

#[cfg(test)]
mod tests {
    use super::{minutes_percentage, Percentage};

    #[test]
    fn test_percentage_rejects_negative() {
        assert!(Percentage::new_opt(-1.).is_none());
        assert!(Percentage::new_opt(f64::NAN).is_none());
    }

    #[test]
    fn test_minutes_percentage_caps() {
        assert_eq!(*minutes_percentage(45., 60.), 75.);
        assert_eq!(*minutes_percentage(90., 60.), 100.);
        assert_eq!(minutes_percentage(45., 60.).to_string(), "75%");
    }
}
