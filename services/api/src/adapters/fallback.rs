//! services/api/src/adapters/fallback.rs
//!
//! Stand-ins used when no LLM key is configured, or when the LLM call fails.

use async_trait::async_trait;
use ewaste_core::{
    domain::{ChatMessage, DumpingAnalysis},
    ports::{AssistantService, DumpingAnalysisService, PortError, PortResult},
};

/// Always fails, so report submission takes the `medium` fallback path.
pub struct UnconfiguredAnalysis;

#[async_trait]
impl DumpingAnalysisService for UnconfiguredAnalysis {
    async fn analyze(&self, _: &str, _: &str, _: &str) -> PortResult<DumpingAnalysis> {
        Err(PortError::Unexpected("no analysis model configured".to_string()))
    }
}

/// Answers from a fixed set of disposal guides picked by keyword.
pub struct GuideAssistant;

#[async_trait]
impl AssistantService for GuideAssistant {
    async fn reply(&self, _history: &[ChatMessage], message: &str) -> PortResult<String> {
        Ok(guide_for(message).to_string())
    }
}

const GUIDES: &[(&[&str], &str)] = &[
    (
        &["smartphone", "phone", "mobile"],
        "For smartphones and mobile phones:\n\n1. Remove personal data and perform a factory reset\n2. Remove the battery if possible\n3. Take to certified e-waste recyclers or manufacturer take-back programs\n4. Many retailers offer trade-in programs\n5. Never throw in regular trash - phones contain valuable metals like gold, silver, and rare earth elements\n\nSmartphones can be refurbished and reused, or materials can be recovered for new electronics.",
    ),
    (
        &["laptop", "computer", "pc"],
        "For laptops and computers:\n\n1. Back up important data and wipe the hard drive completely\n2. Remove batteries if possible\n3. Donate if still functional to schools or charities\n4. Take to certified e-waste recycling centers\n5. Consider manufacturer take-back programs\n\nComputers contain valuable materials like copper, aluminum, and precious metals that can be recovered and reused.",
    ),
    (
        &["battery", "batteries"],
        "For batteries:\n\n1. Never throw batteries in regular trash\n2. Sort by type: alkaline, lithium-ion, lead-acid, etc.\n3. Take to designated battery collection points\n4. Many retailers have battery drop-off programs\n5. Lithium-ion batteries (from phones, laptops) need special handling\n\nBatteries contain toxic materials but also valuable metals that can be recycled into new batteries.",
    ),
    (
        &["tv", "television", "monitor"],
        "For TVs and monitors:\n\n1. Check if still functional - consider donation\n2. Never put in regular trash due to lead and mercury content\n3. Take to certified e-waste recyclers\n4. Some manufacturers offer take-back programs\n5. Remove any batteries from remotes\n\nOlder CRT TVs/monitors contain lead and require special handling. Newer LCD/LED models contain valuable materials for recycling.",
    ),
    (
        &["printer", "scanner"],
        "For printers and scanners:\n\n1. Remove ink/toner cartridges (recycle separately)\n2. Clear any paper jams and remove paper\n3. Take to e-waste recycling centers\n4. Many office supply stores accept old printers\n5. Consider manufacturer take-back programs\n\nPrinters contain metals and plastics that can be recycled, plus valuable components in the electronics.",
    ),
    (
        &["cable", "charger", "cord"],
        "For cables and chargers:\n\n1. Don't throw in regular trash - they contain copper and other metals\n2. Take to e-waste collection points\n3. Many electronics stores accept old cables\n4. Strip copper wire if you have the tools (for large quantities)\n5. USB cables and phone chargers are especially valuable for recycling\n\nCables contain copper which is highly recyclable and valuable.",
    ),
    (
        &["refrigerator", "fridge", "appliance"],
        "For large appliances like refrigerators:\n\n1. Contact your utility company - many offer rebate programs\n2. Schedule pickup with certified recyclers\n3. Ensure proper refrigerant removal (contains ozone-depleting substances)\n4. Remove all food and clean before disposal\n5. Consider donation if still functional\n\nLarge appliances contain valuable metals and require proper refrigerant handling to protect the environment.",
    ),
    (
        &["recycle", "where", "location"],
        "To find e-waste recycling locations:\n\n1. Use the Recycling Map feature to find nearby facilities\n2. Check with local waste management companies\n3. Contact manufacturer take-back programs\n4. Visit retailer drop-off programs\n5. Look for community e-waste collection events\n\nAlways verify that recyclers are certified and follow proper environmental standards.",
    ),
    (
        &["data", "security", "personal"],
        "For data security before disposal:\n\n1. Back up important files to cloud or external drive\n2. Sign out of all accounts and services\n3. Perform a factory reset or format\n4. For hard drives: use data wiping software or physical destruction\n5. Remove memory cards and SIM cards\n\nProper data wiping prevents identity theft and protects your personal information.",
    ),
    (
        &["environment", "toxic", "harmful"],
        "Environmental impact of e-waste:\n\n1. Contains toxic materials: lead, mercury, cadmium, brominated flame retardants\n2. Improper disposal contaminates soil and water\n3. Accounts for 70% of toxic waste in landfills despite being only 2% of total waste\n4. Proper recycling recovers valuable materials and prevents pollution\n5. Global e-waste grows by 4% annually\n\nRecycling e-waste properly protects the environment and conserves natural resources.",
    ),
];

const DEFAULT_GUIDE: &str = "I can help you with e-waste disposal questions! Here are some topics I can assist with:\n\n- Smartphone and mobile phone disposal\n- Computer and laptop recycling\n- Battery disposal guidelines\n- TV and monitor recycling\n- Printer and scanner disposal\n- Cable and charger recycling\n- Large appliance disposal\n- Data security before disposal\n- Environmental impact of e-waste\n- Finding recycling locations\n\nPlease ask me about any specific electronic device or e-waste topic!";

/// The first guide whose keywords appear in `question` (substring match,
/// case-insensitive), or the topic list.
pub fn guide_for(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    GUIDES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, guide)| *guide)
        .unwrap_or(DEFAULT_GUIDE)
}
