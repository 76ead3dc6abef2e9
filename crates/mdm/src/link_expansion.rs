//! Expands patient ids through MDM Person links.

use std::collections::BTreeSet;

use helios_persistence::core::{DaoRegistry, ResourceDao};
use helios_persistence::error::StorageResult;
use helios_persistence::search::converters::parse_reference;
use helios_persistence::types::{SearchParameter, SearchQuery, SearchValue};
use serde_json::Value;

use crate::error::MdmResult;

/// Finds every patient linked to the same Person as a given patient.
#[derive(Debug, Clone)]
pub struct MdmLinkExpansionSvc {
    person_dao: ResourceDao,
}

impl MdmLinkExpansionSvc {
    pub fn new(daos: &DaoRegistry) -> MdmResult<Self> {
        Ok(Self {
            person_dao: daos.get_resource_dao("Person")?,
        })
    }

    /// Returns `patient_ids` plus the ids of all patients that share a
    /// Person with any of them, sorted and without duplicates.
    pub async fn expand_patient_ids(&self, patient_ids: &[String]) -> StorageResult<Vec<String>> {
        let mut expanded: BTreeSet<String> = patient_ids.iter().cloned().collect();
        if patient_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = SearchQuery::new("Person")
            .with_parameter(SearchParameter {
                name: "link".to_string(),
                values: patient_ids
                    .iter()
                    .map(|id| SearchValue::reference(format!("Patient/{}", id)))
                    .collect(),
            })
            .load_synchronous();
        let persons = self.person_dao.search(query).await?;

        for person in &persons.resources {
            expanded.extend(linked_patient_ids(person.content()));
        }

        tracing::debug!(
            requested = patient_ids.len(),
            persons = persons.len(),
            expanded = expanded.len(),
            "Expanded patients through MDM links"
        );
        Ok(expanded.into_iter().collect())
    }
}

/// Patient ids referenced from `Person.link.target`.
fn linked_patient_ids(person: &Value) -> Vec<String> {
    person
        .get("link")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|link| link.pointer("/target/reference").and_then(Value::as_str))
        .filter_map(|reference| match parse_reference(reference) {
            (Some(rt), Some(id)) if rt == "Patient" => Some(id),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_linked_patient_ids() {
        let person = json!({
            "resourceType": "Person",
            "link": [
                {"target": {"reference": "Patient/a"}},
                {"target": {"reference": "Practitioner/doc"}},
                {"target": {"display": "no reference"}},
                {"target": {"reference": "http://other.org/fhir/Patient/b"}}
            ]
        });
        assert_eq!(linked_patient_ids(&person), vec!["a", "b"]);
        assert!(linked_patient_ids(&json!({"resourceType": "Person"})).is_empty());
    }
}
