use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub specialization: String,
    pub phone: String,
    pub department: Option<String>,
    pub avatar: Option<String>,
    pub experience: Option<String>,
    pub rating: Option<f64>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: String,
    pub phone: String,
    pub bio: Option<String>,
}
