//! Last activity mappers

use stanza_core::LastActivity;

use crate::models::LastModel;

impl From<LastModel> for LastActivity {
    fn from(model: LastModel) -> Self {
        LastActivity::new(model.username, model.seconds, model.status)
    }
}
