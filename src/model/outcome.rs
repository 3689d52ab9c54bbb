use super::TrialParams;

/// Result of a compression call.
///
/// There is no failure variant: a missed budget is still a `Success` carrying
/// the smallest output produced, and input that cannot be decoded as the
/// claimed kind comes back untouched as `PassThrough`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Compressed),
    PassThrough(Vec<u8>),
}

/// Bytes chosen by a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    /// Whether `bytes` fits the budget
    pub within_budget: bool,
    /// Trial that produced `bytes`; None when every trial failed and the
    /// original input is returned
    pub trial: Option<TrialParams>,
}

impl Outcome {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Outcome::Success(compressed) => &compressed.bytes,
            Outcome::PassThrough(original) => original,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Outcome::Success(compressed) => compressed.bytes,
            Outcome::PassThrough(original) => original,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Outcome::PassThrough(_))
    }

    pub fn within_budget(&self) -> bool {
        match self {
            Outcome::Success(compressed) => compressed.within_budget,
            Outcome::PassThrough(_) => false,
        }
    }

    pub fn trial(&self) -> Option<TrialParams> {
        match self {
            Outcome::Success(compressed) => compressed.trial,
            Outcome::PassThrough(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_reports_original() {
        let outcome = Outcome::PassThrough(b"not an image".to_vec());
        assert!(outcome.is_pass_through());
        assert!(!outcome.within_budget());
        assert_eq!(outcome.trial(), None);
        assert_eq!(outcome.bytes(), b"not an image");
    }

    #[test]
    fn test_success_is_not_pass_through() {
        let outcome = Outcome::Success(Compressed {
            bytes: vec![1, 2, 3],
            within_budget: true,
            trial: None,
        });
        assert!(!outcome.is_pass_through());
        assert!(outcome.within_budget());
        assert_eq!(outcome.into_bytes(), vec![1, 2, 3]);
    }
}
