//! Concept dictionary entities
//!
//! Every captured datum is addressed by a concept with a declared data type.
//! Coded concepts own an ordered list of answer concepts; answers are
//! themselves concepts. QuestionGroup concepts nest recursively.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;

/// Declared data type of a concept
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConceptDataType {
    Coded,
    Numeric,
    Text,
    Notes,
    Date,
    DateTime,
    Time,
    Duration,
    Image,
    Video,
    QuestionGroup,
    PhoneNumber,
    #[serde(rename = "NA")]
    Na,
}

/// Membership of an answer concept in a coded concept, with its display order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConceptAnswer {
    pub answer_concept_id: i64,
    pub order: u32,
    pub voided: bool,
}

/// Named element of the dynamic attribute dictionary
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Concept {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub data_type: ConceptDataType,

    /// Ordered answer set; meaningful only when `data_type` is `Coded`
    #[serde(default)]
    pub answers: Vec<ConceptAnswer>,

    pub audit: Audit,
    pub voided: bool,
}

impl Concept {
    pub fn new(id: i64, name: &str, data_type: ConceptDataType) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            data_type,
            answers: Vec::new(),
            audit: Audit::default(),
            voided: false,
        }
    }

    pub fn is_coded(&self) -> bool {
        self.data_type == ConceptDataType::Coded
    }

    pub fn is_question_group(&self) -> bool {
        self.data_type == ConceptDataType::QuestionGroup
    }

    /// Internal ids of non-voided answer concepts, in declared order
    pub fn answer_concept_ids(&self) -> Vec<i64> {
        let mut answers: Vec<&ConceptAnswer> =
            self.answers.iter().filter(|a| !a.voided).collect();
        answers.sort_by_key(|a| a.order);
        answers.iter().map(|a| a.answer_concept_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_ordering_skips_voided() {
        let mut concept = Concept::new(1, "Symptom", ConceptDataType::Coded);
        concept.answers = vec![
            ConceptAnswer { answer_concept_id: 12, order: 2, voided: false },
            ConceptAnswer { answer_concept_id: 13, order: 3, voided: true },
            ConceptAnswer { answer_concept_id: 11, order: 1, voided: false },
        ];

        assert_eq!(concept.answer_concept_ids(), vec![11, 12]);
    }
}
