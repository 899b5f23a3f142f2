use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub age: Option<i32>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub age: Option<i32>,
    pub medical_history: Option<String>,
}

/// Fields a patient may change on their own profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
}

impl Patient {
    pub fn apply(&mut self, update: PatientUpdate) {
        self.name = update.name;
        self.phone = update.phone.unwrap_or_default();
        self.address = update.address;
        self.emergency_contact = update.emergency_contact;
    }
}
