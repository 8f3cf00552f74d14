// Document model - typed records, creation drafts, and field-wise patches.
// Wire/file field names match the journal's JSON format (camelCase).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Behavior every stored record type provides to the collection store.
pub trait JournalDocument: Clone + Serialize + DeserializeOwned + Send + 'static {
    /// Caller-supplied creation payload (no id, no timestamps).
    type Draft: DeserializeOwned + Send + 'static;
    /// Field-wise update; an absent field leaves the stored value unchanged.
    type Patch: DeserializeOwned + Send + 'static;

    /// Collection name, used for the backing file and in error reporting.
    const COLLECTION: &'static str;

    fn from_draft(draft: Self::Draft, id: String, now: DateTime<Utc>) -> Self;
    fn id(&self) -> &str;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Merge the patch over the current fields. Supplied fields overwrite,
    /// absent fields are preserved. Does not touch `updatedAt`.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Bump `updatedAt`.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Point the image field named by `slot` at `path`.
    /// Returns false when the slot does not belong to this record type.
    fn set_image(&mut self, slot: &str, path: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Planned,
    Reviewed,
}

/// Strategy tag a trade was taken under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeRule {
    #[serde(rename = "EMA-ATR")]
    EmaAtr,
    Breakout,
}

/// One journaled trade. `entryTime`/`exitTime` are caller-formatted strings
/// stored verbatim; only `createdAt`/`updatedAt` are store-owned timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<TradeRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_take_profit: Option<f64>,
    /// Reward/risk ratio computed by the client and stored verbatim.
    #[serde(rename = "expectedRRRatio", skip_serializing_if = "Option::is_none")]
    pub expected_rr_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_profit_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_image: Option<String>,
    #[serde(default)]
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a trade.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDraft {
    pub plan_id: Option<String>,
    pub symbol: String,
    pub rule: Option<TradeRule>,
    pub entry_time: Option<String>,
    pub entry_price: Option<f64>,
    pub reason: Option<String>,
    pub expected_stop_loss: Option<f64>,
    pub expected_take_profit: Option<f64>,
    #[serde(rename = "expectedRRRatio")]
    pub expected_rr_ratio: Option<f64>,
    pub actual_exit_price: Option<f64>,
    pub actual_profit_loss: Option<f64>,
    pub exit_time: Option<String>,
    pub summary: Option<String>,
    pub entry_image: Option<String>,
    pub exit_image: Option<String>,
    pub status: Option<TradeStatus>,
}

/// Field-wise update for a trade; absent means "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePatch {
    pub plan_id: Option<String>,
    pub symbol: Option<String>,
    pub rule: Option<TradeRule>,
    pub entry_time: Option<String>,
    pub entry_price: Option<f64>,
    pub reason: Option<String>,
    pub expected_stop_loss: Option<f64>,
    pub expected_take_profit: Option<f64>,
    #[serde(rename = "expectedRRRatio")]
    pub expected_rr_ratio: Option<f64>,
    pub actual_exit_price: Option<f64>,
    pub actual_profit_loss: Option<f64>,
    pub exit_time: Option<String>,
    pub summary: Option<String>,
    pub entry_image: Option<String>,
    pub exit_image: Option<String>,
    pub status: Option<TradeStatus>,
}

impl JournalDocument for TradeRecord {
    type Draft = TradeDraft;
    type Patch = TradePatch;

    const COLLECTION: &'static str = "trades";

    fn from_draft(draft: TradeDraft, id: String, now: DateTime<Utc>) -> Self {
        TradeRecord {
            id,
            plan_id: draft.plan_id,
            symbol: draft.symbol,
            rule: draft.rule,
            entry_time: draft.entry_time,
            entry_price: draft.entry_price,
            reason: draft.reason,
            expected_stop_loss: draft.expected_stop_loss,
            expected_take_profit: draft.expected_take_profit,
            expected_rr_ratio: draft.expected_rr_ratio,
            actual_exit_price: draft.actual_exit_price,
            actual_profit_loss: draft.actual_profit_loss,
            exit_time: draft.exit_time,
            summary: draft.summary,
            entry_image: draft.entry_image,
            exit_image: draft.exit_image,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: TradePatch) {
        if let Some(v) = patch.plan_id {
            self.plan_id = Some(v);
        }
        if let Some(v) = patch.symbol {
            self.symbol = v;
        }
        if let Some(v) = patch.rule {
            self.rule = Some(v);
        }
        if let Some(v) = patch.entry_time {
            self.entry_time = Some(v);
        }
        if let Some(v) = patch.entry_price {
            self.entry_price = Some(v);
        }
        if let Some(v) = patch.reason {
            self.reason = Some(v);
        }
        if let Some(v) = patch.expected_stop_loss {
            self.expected_stop_loss = Some(v);
        }
        if let Some(v) = patch.expected_take_profit {
            self.expected_take_profit = Some(v);
        }
        if let Some(v) = patch.expected_rr_ratio {
            self.expected_rr_ratio = Some(v);
        }
        if let Some(v) = patch.actual_exit_price {
            self.actual_exit_price = Some(v);
        }
        if let Some(v) = patch.actual_profit_loss {
            self.actual_profit_loss = Some(v);
        }
        if let Some(v) = patch.exit_time {
            self.exit_time = Some(v);
        }
        if let Some(v) = patch.summary {
            self.summary = Some(v);
        }
        if let Some(v) = patch.entry_image {
            self.entry_image = Some(v);
        }
        if let Some(v) = patch.exit_image {
            self.exit_image = Some(v);
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn set_image(&mut self, slot: &str, path: &str) -> bool {
        match slot {
            "entry" => {
                self.entry_image = Some(path.to_string());
                true
            }
            "exit" => {
                self.exit_image = Some(path.to_string());
                true
            }
            _ => false,
        }
    }
}

/// One trade plan with its optional review summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePlan {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_image: Option<String>,
    #[serde(default)]
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a plan.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    pub content: String,
    pub plan_image: Option<String>,
    pub summary: Option<String>,
    pub summary_image: Option<String>,
    pub status: Option<PlanStatus>,
}

/// Field-wise update for a plan; absent means "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    pub content: Option<String>,
    pub plan_image: Option<String>,
    pub summary: Option<String>,
    pub summary_image: Option<String>,
    pub status: Option<PlanStatus>,
}

impl JournalDocument for TradePlan {
    type Draft = PlanDraft;
    type Patch = PlanPatch;

    const COLLECTION: &'static str = "plans";

    fn from_draft(draft: PlanDraft, id: String, now: DateTime<Utc>) -> Self {
        TradePlan {
            id,
            content: draft.content,
            plan_image: draft.plan_image,
            summary: draft.summary,
            summary_image: draft.summary_image,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply_patch(&mut self, patch: PlanPatch) {
        if let Some(v) = patch.content {
            self.content = v;
        }
        if let Some(v) = patch.plan_image {
            self.plan_image = Some(v);
        }
        if let Some(v) = patch.summary {
            self.summary = Some(v);
        }
        if let Some(v) = patch.summary_image {
            self.summary_image = Some(v);
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn set_image(&mut self, slot: &str, path: &str) -> bool {
        match slot {
            "plan" => {
                self.plan_image = Some(path.to_string());
                true
            }
            "summary" => {
                self.summary_image = Some(path.to_string());
                true
            }
            _ => false,
        }
    }
}
