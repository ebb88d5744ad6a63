//! The fixed set of hubs created at startup

use super::actor::Hub;
use super::registry::{BroadcastRegistry, HubStats, KeyedRegistry};
use serde::Serialize;

/// Broadcast hub for admin dashboards
pub type AdminHub = Hub<BroadcastRegistry>;
/// Hub keyed by employee id
pub type EmployeeHub = Hub<KeyedRegistry<String>>;
/// Hub keyed by chat room id
pub type ChatHub = Hub<KeyedRegistry<String>>;

/// All hubs of the process. Cloning shares the same running loops.
#[derive(Clone)]
pub struct HubSet {
    pub admin: AdminHub,
    pub employee: EmployeeHub,
    pub chat: ChatHub,
}

/// Registry sizes per hub, `None` for a hub whose loop is gone
#[derive(Debug, Clone, Serialize)]
pub struct HubSetStats {
    pub admin: Option<HubStats>,
    pub employee: Option<HubStats>,
    pub chat: Option<HubStats>,
}

impl HubSet {
    /// Spawn the admin, employee and chat hub loops.
    pub fn spawn() -> Self {
        Self {
            admin: Hub::spawn("admin", BroadcastRegistry::new()),
            employee: Hub::spawn("employee", KeyedRegistry::new()),
            chat: Hub::spawn("chat", KeyedRegistry::new()),
        }
    }

    pub async fn stats(&self) -> HubSetStats {
        let (admin, employee, chat) =
            tokio::join!(self.admin.stats(), self.employee.stats(), self.chat.stats());
        HubSetStats {
            admin,
            employee,
            chat,
        }
    }
}
