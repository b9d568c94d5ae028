// Simple entity filter implementation
use crate::Entity;

pub trait Filter {
    fn matches(&self, entity: &Entity) -> bool;
}

pub struct EntityFilter {
    condition: FilterCondition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCondition {
    TypeIs(String),
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Contains { key: String, value: String },
    Exists(String),
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl EntityFilter {
    pub fn new(condition: FilterCondition) -> Self {
        Self { condition }
    }

    /// Build an exact-match filter from query-string style pairs.
    /// `type` selects on the entity type, every other key on a property.
    pub fn from_pairs<'a, I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let conditions: Vec<FilterCondition> = pairs
            .into_iter()
            .map(|(key, value)| match key {
                "type" => FilterCondition::TypeIs(value.to_string()),
                _ => FilterCondition::Equals {
                    key: key.to_string(),
                    value: value.to_string(),
                },
            })
            .collect();

        match conditions.len() {
            0 => None,
            1 => conditions.into_iter().next().map(Self::new),
            _ => Some(Self::new(FilterCondition::And(conditions))),
        }
    }

    pub fn condition(&self) -> &FilterCondition {
        &self.condition
    }

    fn matches_condition(condition: &FilterCondition, entity: &Entity) -> bool {
        match condition {
            FilterCondition::TypeIs(t) => entity.entity_type == *t,
            FilterCondition::Equals { key, value } => entity
                .properties
                .get(key)
                .map(|v| v == value)
                .unwrap_or(false),
            FilterCondition::NotEquals { key, value } => entity
                .properties
                .get(key)
                .map(|v| v != value)
                .unwrap_or(true),
            FilterCondition::Contains { key, value } => entity
                .properties
                .get(key)
                .map(|v| v.contains(value.as_str()))
                .unwrap_or(false),
            FilterCondition::Exists(key) => entity.properties.contains_key(key),
            FilterCondition::And(conditions) => {
                conditions.iter().all(|c| Self::matches_condition(c, entity))
            }
            FilterCondition::Or(conditions) => {
                conditions.iter().any(|c| Self::matches_condition(c, entity))
            }
            FilterCondition::Not(condition) => !Self::matches_condition(condition, entity),
        }
    }
}

impl Filter for EntityFilter {
    fn matches(&self, entity: &Entity) -> bool {
        Self::matches_condition(&self.condition, entity)
    }
}
