pub mod appointment;
pub mod bill;
pub mod doctor;
pub mod enums;
pub mod patient;
pub mod prescription;
pub mod triage;
pub mod user;

pub use appointment::{Appointment, TriageSnapshot};
pub use bill::{Bill, BillItem};
pub use doctor::{DayAvailability, Department, Doctor};
pub use enums::*;
pub use patient::{EmergencyContact, InsuranceInfo, MedicalHistoryEntry, Patient};
pub use prescription::{Medication, Prescription};
pub use triage::TriagePrediction;
pub use user::User;
