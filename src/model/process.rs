use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    ProcflowError, Result,
    model::{ActivityModel, TransitionModel},
};

/// Deployable process model.
///
/// `key` identifies the process across versions; each deployment of the
/// same key gets an incremented version number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessModel {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub activities: Vec<ActivityModel>,
    pub transitions: Vec<TransitionModel>,
}

impl ProcessModel {
    pub fn from_json(s: &str) -> Result<Self> {
        let model = serde_json::from_str::<ProcessModel>(s);
        match model {
            Ok(v) => Ok(v),
            Err(e) => Err(ProcflowError::Definition(format!("{}", e))),
        }
    }
}
