use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendorauth_core::{Entity, VendorId};

/// The two permitted business transitions on a vendor's sales authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Authorize,
    Revoke,
}

impl Transition {
    pub fn from_target(authorized: bool) -> Self {
        if authorized {
            Self::Authorize
        } else {
            Self::Revoke
        }
    }

    /// Authorization flag value after this transition is applied.
    pub fn target(&self) -> bool {
        matches!(self, Self::Authorize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Revoke => "revoke",
        }
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current sales-authorization state of a vendor.
///
/// Only the timestamp of the most recent transition is meaningful. The other
/// one keeps whatever value it last had (or stays absent if that direction was
/// never taken).
///
/// Only these four fields are persisted. Unknown fields in a loaded file, such
/// as the person id and salary the legacy roster format carried, are ignored
/// on load and dropped on the next rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRecord {
    pub vendor_id: VendorId,
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl VendorRecord {
    /// A never-authorized record, as created implicitly on first state change.
    pub fn new(vendor_id: VendorId) -> Self {
        Self {
            vendor_id,
            authorized: false,
            authorized_at: None,
            revoked_at: None,
        }
    }

    /// Set the flag and stamp the timestamp matching the direction.
    pub fn apply(&mut self, authorized: bool, at: DateTime<Utc>) {
        self.authorized = authorized;
        if authorized {
            self.authorized_at = Some(at);
        } else {
            self.revoked_at = Some(at);
        }
    }
}

impl Entity for VendorRecord {
    type Id = VendorId;

    fn id(&self) -> VendorId {
        self.vendor_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn vid(raw: i64) -> VendorId {
        VendorId::new(raw).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn new_record_is_unauthorized_without_timestamps() {
        let rec = VendorRecord::new(vid(5));
        assert!(!rec.authorized);
        assert_eq!(rec.authorized_at, None);
        assert_eq!(rec.revoked_at, None);
        assert_eq!(rec.id(), vid(5));
    }

    #[test]
    fn revoking_keeps_the_previous_authorization_timestamp() {
        let mut rec = VendorRecord::new(vid(1));
        rec.apply(true, t0());
        rec.apply(false, t0() + Duration::hours(1));

        assert!(!rec.authorized);
        assert_eq!(rec.authorized_at, Some(t0()));
        assert_eq!(rec.revoked_at, Some(t0() + Duration::hours(1)));
    }

    #[test]
    fn repeated_authorization_only_moves_authorized_at() {
        let mut rec = VendorRecord::new(vid(1));
        rec.apply(false, t0());
        rec.apply(true, t0() + Duration::minutes(1));
        rec.apply(true, t0() + Duration::minutes(2));

        assert_eq!(rec.authorized_at, Some(t0() + Duration::minutes(2)));
        assert_eq!(rec.revoked_at, Some(t0()));
    }

    #[test]
    fn json_uses_camel_case_and_omits_absent_timestamps() {
        let mut rec = VendorRecord::new(vid(9));
        rec.apply(true, t0());
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["vendorId"], 9);
        assert_eq!(json["authorized"], true);
        assert_eq!(json["authorizedAt"], "2024-03-01T09:30:00Z");
        assert!(json.get("revokedAt").is_none());
    }

    #[test]
    fn legacy_roster_fields_are_ignored_on_load() {
        let raw = r#"{"vendorId":3,"authorized":true,"idPersona":17,"sueldo":1200.5}"#;
        let rec: VendorRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(rec, VendorRecord { authorized: true, ..VendorRecord::new(vid(3)) });
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("idPersona").is_none());
        assert!(json.get("sueldo").is_none());
    }

    #[test]
    fn transition_round_trips_through_target() {
        for t in [Transition::Authorize, Transition::Revoke] {
            assert_eq!(Transition::from_target(t.target()), t);
        }
        assert_eq!(Transition::Revoke.to_string(), "revoke");
    }
}
