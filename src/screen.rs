/// Lifecycle of one screen's remote data. Each arm renders distinctly; a failed
/// fetch keeps its reason instead of masquerading as an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState<T> {
    Loading,
    Loaded(T),
    Empty,
    Failed(String),
}

impl<T> ScreenState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Build a list screen state, collapsing zero rows into `Empty`.
pub fn rows_state<U>(rows: Vec<U>) -> ScreenState<Vec<U>> {
    if rows.is_empty() {
        ScreenState::Empty
    } else {
        ScreenState::Loaded(rows)
    }
}

/// Lifecycle of one remote write. Local state only advances once the store
/// confirms the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Committed,
    Failed(String),
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_collapse_into_empty() {
        let state = rows_state(Vec::<u32>::new());
        assert_eq!(state, ScreenState::Empty);
    }

    #[test]
    fn populated_rows_stay_loaded() {
        let state = rows_state(vec![1, 2]);
        assert_eq!(state.loaded(), Some(&vec![1, 2]));
    }

    #[test]
    fn failed_state_keeps_its_reason() {
        let state: ScreenState<Vec<u32>> = ScreenState::Failed("store unreachable".to_string());
        assert!(state.loaded().is_none());
        assert_ne!(state, ScreenState::Empty);
    }
}
