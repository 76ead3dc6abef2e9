//! Test fixtures for persistence layer testing.
//!
//! Builders for the resources the MDM and bulk export code paths touch.

#![allow(dead_code)]

use serde_json::{Value, json};

/// Enterprise identifier system used across the fixtures.
pub const EID_SYSTEM: &str = "http://example.org/enterprise-id";

/// A patient fixture for testing.
#[derive(Debug, Clone)]
pub struct PatientFixture {
    /// Patient ID.
    pub id: String,
    /// Patient family name.
    pub family: String,
    /// Patient identifiers (system, value pairs).
    pub identifiers: Vec<(String, String)>,
}

impl PatientFixture {
    /// Creates a new patient fixture with minimal required fields.
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            identifiers: vec![],
        }
    }

    /// Adds an identifier.
    pub fn with_identifier(mut self, system: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push((system.into(), value.into()));
        self
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut patient = json!({
            "resourceType": "Patient",
            "id": self.id,
            "name": [{"family": self.family}],
        });

        if !self.identifiers.is_empty() {
            patient["identifier"] = identifiers_json(&self.identifiers);
        }

        patient
    }
}

/// A person fixture linking to patients.
#[derive(Debug, Clone)]
pub struct PersonFixture {
    /// Person ID.
    pub id: String,
    /// Enterprise identifier, if assigned.
    pub eid: Option<String>,
    /// Linked patient ids.
    pub links: Vec<String>,
}

impl PersonFixture {
    /// Creates a new person fixture.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eid: None,
            links: vec![],
        }
    }

    /// Sets the enterprise identifier.
    pub fn with_eid(mut self, eid: impl Into<String>) -> Self {
        self.eid = Some(eid.into());
        self
    }

    /// Links a patient.
    pub fn with_link(mut self, patient_id: impl Into<String>) -> Self {
        self.links.push(patient_id.into());
        self
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut person = json!({
            "resourceType": "Person",
            "id": self.id,
        });

        if let Some(eid) = &self.eid {
            person["identifier"] = identifiers_json(&[(EID_SYSTEM.to_string(), eid.clone())]);
        }

        if !self.links.is_empty() {
            person["link"] = json!(
                self.links
                    .iter()
                    .map(|id| json!({"target": {"reference": format!("Patient/{}", id)}}))
                    .collect::<Vec<_>>()
            );
        }

        person
    }
}

/// An observation about a patient.
pub fn observation(id: &str, patient_id: &str, code: &str) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"coding": [{"system": "http://loinc.org", "code": code}]},
        "subject": {"reference": format!("Patient/{}", patient_id)}
    })
}

/// A group whose members are the given patients.
pub fn group(id: &str, patient_ids: &[&str]) -> Value {
    json!({
        "resourceType": "Group",
        "id": id,
        "type": "person",
        "actual": true,
        "member": patient_ids
            .iter()
            .map(|p| json!({"entity": {"reference": format!("Patient/{}", p)}}))
            .collect::<Vec<_>>()
    })
}

fn identifiers_json(identifiers: &[(String, String)]) -> Value {
    json!(
        identifiers
            .iter()
            .map(|(system, value)| json!({"system": system, "value": value}))
            .collect::<Vec<_>>()
    )
}
