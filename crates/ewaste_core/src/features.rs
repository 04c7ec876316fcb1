//! Which parts of the app stay usable while offline mode is active.
//!
//! Read-only and assistant features keep working; anything that writes a
//! record is switched off for the whole window, however much time is left.

use serde::Serialize;

/// A single gated feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewInformation,
    UseAiAssistant,
    ViewRecyclingMap,
    RegisterItems,
    ScheduleCollection,
    AccessMarketplace,
    AccessWallet,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ViewInformation,
        Capability::UseAiAssistant,
        Capability::ViewRecyclingMap,
        Capability::RegisterItems,
        Capability::ScheduleCollection,
        Capability::AccessMarketplace,
        Capability::AccessWallet,
    ];

    /// Features that mutate persisted records.
    pub fn mutates_records(self) -> bool {
        matches!(
            self,
            Capability::RegisterItems
                | Capability::ScheduleCollection
                | Capability::AccessMarketplace
                | Capability::AccessWallet
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineCapabilities {
    pub can_view_information: bool,
    #[serde(rename = "canUseAIAssistant")]
    pub can_use_ai_assistant: bool,
    pub can_view_recycling_map: bool,
    pub can_register_items: bool,
    pub can_schedule_collection: bool,
    pub can_access_marketplace: bool,
    pub can_access_wallet: bool,
}

impl OfflineCapabilities {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewInformation => self.can_view_information,
            Capability::UseAiAssistant => self.can_use_ai_assistant,
            Capability::ViewRecyclingMap => self.can_view_recycling_map,
            Capability::RegisterItems => self.can_register_items,
            Capability::ScheduleCollection => self.can_schedule_collection,
            Capability::AccessMarketplace => self.can_access_marketplace,
            Capability::AccessWallet => self.can_access_wallet,
        }
    }
}

/// The capability set for the given offline state.
pub fn capabilities(is_offline: bool) -> OfflineCapabilities {
    let online = !is_offline;
    OfflineCapabilities {
        can_view_information: true,
        can_use_ai_assistant: true,
        can_view_recycling_map: true,
        can_register_items: online,
        can_schedule_collection: online,
        can_access_marketplace: online,
        can_access_wallet: online,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_disables_exactly_the_mutating_features() {
        let caps = capabilities(true);
        for capability in Capability::ALL {
            assert_eq!(
                caps.allows(capability),
                !capability.mutates_records(),
                "{capability:?}"
            );
        }
    }

    #[test]
    fn online_enables_everything() {
        let caps = capabilities(false);
        assert!(Capability::ALL.iter().all(|c| caps.allows(*c)));
    }

    #[test]
    fn wire_names_match_the_client_contract() {
        let json = serde_json::to_value(capabilities(true)).unwrap();
        assert_eq!(json["canUseAIAssistant"], true);
        assert_eq!(json["canScheduleCollection"], false);
        assert_eq!(json["canViewRecyclingMap"], true);
    }
}
