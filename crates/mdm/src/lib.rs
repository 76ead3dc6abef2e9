//! Helios master data management lookups.
//!
//! Services the MDM matcher and the bulk exporter use to find Persons,
//! resolve persistent ids and follow Person links:
//!
//! - [`MdmResourceDaoSvc`] - Patient/Person/Practitioner reads, Person
//!   updates and the enterprise id (EID) search
//! - [`ResourcePidHelper`] - pid resolution cached on the resource
//! - [`MdmLinkExpansionSvc`] - patients linked through a shared Person
//! - [`MdmSettings`] - rules loaded from JSON

pub mod dao_svc;
pub mod error;
pub mod link_expansion;
pub mod pid_helper;
pub mod settings;

pub use dao_svc::MdmResourceDaoSvc;
pub use error::{MdmError, MdmResult};
pub use link_expansion::MdmLinkExpansionSvc;
pub use pid_helper::ResourcePidHelper;
pub use settings::{MdmRules, MdmSettings};
