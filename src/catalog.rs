/*
Registered notification types and their default bilingual content.

This module provides:
- The closed set of notification types the platform is allowed to send.
- Embedded default title/message content for each type (compile-time JSON),
  in both platform languages (primary = English, secondary = Arabic).
- Lookup helpers used by template seeding and by the template resolver's
  registration check.

Notes:
- Placeholders in message strings use single-brace format: `{name}`; they are
  substituted from the notification's metadata by consumers of the feed.
- A type missing from this catalog is rejected before any delivery work
  happens; stored template rows without a catalog entry indicate drift.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

static CATALOG: OnceLock<HashMap<String, CatalogEntry>> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub module: String,
    pub title_primary: String,
    pub title_secondary: String,
    pub message_primary: String,
    pub message_secondary: String,
}

const CATALOG_JSON: &str = r#"
{
  "ad_approved": {
    "module": "ads",
    "title_primary": "Ad approved",
    "title_secondary": "تمت الموافقة على الإعلان",
    "message_primary": "Your ad \"{ad_title}\" has been approved and is now live.",
    "message_secondary": "تمت الموافقة على إعلانك \"{ad_title}\" وهو الآن منشور."
  },
  "ad_rejected": {
    "module": "ads",
    "title_primary": "Ad rejected",
    "title_secondary": "تم رفض الإعلان",
    "message_primary": "Your ad \"{ad_title}\" was rejected: {reason}",
    "message_secondary": "تم رفض إعلانك \"{ad_title}\": {reason}"
  },
  "ad_expiring": {
    "module": "ads",
    "title_primary": "Ad expiring soon",
    "title_secondary": "إعلانك على وشك الانتهاء",
    "message_primary": "Your ad \"{ad_title}\" expires in {days_left} day(s). Renew it to keep it visible.",
    "message_secondary": "ينتهي إعلانك \"{ad_title}\" خلال {days_left} يوم. جدده ليبقى ظاهرًا."
  },
  "ad_expired": {
    "module": "ads",
    "title_primary": "Ad expired",
    "title_secondary": "انتهى الإعلان",
    "message_primary": "Your ad \"{ad_title}\" has expired and is no longer visible.",
    "message_secondary": "انتهت مدة إعلانك \"{ad_title}\" ولم يعد ظاهرًا."
  },
  "payment_received": {
    "module": "payments",
    "title_primary": "Payment received",
    "title_secondary": "تم استلام الدفعة",
    "message_primary": "We received your payment of {amount} {currency}.",
    "message_secondary": "استلمنا دفعتك بمبلغ {amount} {currency}."
  },
  "payment_failed": {
    "module": "payments",
    "title_primary": "Payment failed",
    "title_secondary": "فشلت عملية الدفع",
    "message_primary": "Your payment of {amount} {currency} could not be processed.",
    "message_secondary": "تعذّرت معالجة دفعتك بمبلغ {amount} {currency}."
  },
  "subscription_expiring": {
    "module": "payments",
    "title_primary": "Subscription expiring",
    "title_secondary": "اشتراكك على وشك الانتهاء",
    "message_primary": "Your {plan} subscription expires on {expires_at}.",
    "message_secondary": "ينتهي اشتراكك في باقة {plan} بتاريخ {expires_at}."
  },
  "account_verified": {
    "module": "account",
    "title_primary": "Account verified",
    "title_secondary": "تم توثيق الحساب",
    "message_primary": "Your account has been verified. You can now publish ads.",
    "message_secondary": "تم توثيق حسابك. يمكنك الآن نشر الإعلانات."
  },
  "admin_announcement": {
    "module": "system",
    "title_primary": "Announcement",
    "title_secondary": "إعلان إداري",
    "message_primary": "{body}",
    "message_secondary": "{body_ar}"
  }
}
"#;

fn build_catalog() -> HashMap<String, CatalogEntry> {
    serde_json::from_str(CATALOG_JSON).unwrap_or_else(|e| {
        panic!("failed to parse CATALOG_JSON in catalog module: {}", e);
    })
}

/// Returns the global catalog map (notification_type -> default content).
pub fn catalog() -> &'static HashMap<String, CatalogEntry> {
    CATALOG.get_or_init(build_catalog)
}

/// Returns true if the given notification type is registered.
pub fn is_registered(notification_type: &str) -> bool {
    catalog().contains_key(notification_type)
}

/// Default content for a registered type, if any.
pub fn default_content(notification_type: &str) -> Option<&'static CatalogEntry> {
    catalog().get(notification_type)
}

/// All registered notification types, sorted for deterministic seeding.
pub fn registered_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = catalog().keys().map(|k| k.as_str()).collect();
    types.sort_unstable();
    types
}
