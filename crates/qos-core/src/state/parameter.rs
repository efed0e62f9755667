use std::collections::HashMap;

/// Value → observation count map used to find the majority-reported value among endpoints.
pub type ConsensusMap = HashMap<String, u64>;

/// A single named value held in service state.
///
/// Parameters are replaced wholesale by state updates and never mutated in place, so a
/// reader's copy stays stable for the duration of its operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateParameter {
    Str(String),
    Int(i64),
    Consensus(ConsensusMap),
}

impl StateParameter {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_consensus(&self) -> Option<&ConsensusMap> {
        match self {
            Self::Consensus(map) => Some(map),
            _ => None,
        }
    }
}

/// Returns the value with the highest count, breaking ties by the smaller value so the
/// outcome does not depend on map iteration order.
#[must_use]
pub fn majority_value(map: &ConsensusMap) -> Option<(&str, u64)> {
    map.iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(value, count)| (value.as_str(), *count))
}

/// A set of named parameter replacements produced by one state update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterUpdates {
    params: HashMap<String, StateParameter>,
}

impl ParameterUpdates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: StateParameter) {
        self.params.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateParameter> {
        self.params.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateParameter)> {
        self.params.iter()
    }
}

impl FromIterator<(String, StateParameter)> for ParameterUpdates {
    fn from_iter<I: IntoIterator<Item = (String, StateParameter)>>(iter: I) -> Self {
        Self { params: iter.into_iter().collect() }
    }
}
