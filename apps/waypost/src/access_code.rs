use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use crate::error::RelayError;
use crate::ids;

/// One 6-digit direct-connect code. Timestamps are unix millis so the
/// HTTP surface can hand `expires` straight to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCode {
    pub code: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub used: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeView {
    pub code: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub time_remaining: u64,
    pub used: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccessCodeStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub used: usize,
}

/// Table of live access codes. Independent from clients and sessions,
/// same TTL sweep discipline.
pub struct AccessCodeTable {
    codes: HashMap<String, AccessCode>,
    ttl_ms: u64,
}

impl AccessCodeTable {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            codes: HashMap::new(),
            ttl_ms: ttl_secs * 1000,
        }
    }

    pub fn generate(&mut self) -> Result<AccessCode, RelayError> {
        let code = ids::allocate_access_code(|candidate| self.codes.contains_key(candidate))?;
        let now = now_millis();
        let entry = AccessCode {
            code: code.clone(),
            created_at: now,
            expires_at: now + self.ttl_ms,
            used: false,
        };
        self.codes.insert(code, entry.clone());
        debug!("access code generated, expires at {}", entry.expires_at);
        Ok(entry)
    }

    /// A code validates while it exists, has not expired, and has not been
    /// flagged used. Expired codes are dropped on sight. The used flag is
    /// stored and reported but never set by validation itself.
    pub fn validate(&mut self, code: &str) -> bool {
        let Some(entry) = self.codes.get(code) else {
            debug!("unknown access code");
            return false;
        };
        if now_millis() > entry.expires_at {
            debug!("expired access code");
            self.codes.remove(code);
            return false;
        }
        !entry.used
    }

    pub fn revoke(&mut self, code: &str) -> bool {
        self.codes.remove(code).is_some()
    }

    pub fn active(&self) -> Vec<AccessCodeView> {
        let now = now_millis();
        self.codes
            .values()
            .filter(|entry| now <= entry.expires_at)
            .map(|entry| AccessCodeView {
                code: entry.code.clone(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
                time_remaining: entry.expires_at - now,
                used: entry.used,
            })
            .collect()
    }

    /// Drop every expired code, returning how many were removed.
    pub fn sweep(&mut self) -> usize {
        let now = now_millis();
        let before = self.codes.len();
        self.codes.retain(|_, entry| now <= entry.expires_at);
        before - self.codes.len()
    }

    pub fn stats(&self) -> AccessCodeStats {
        let now = now_millis();
        let total = self.codes.len();
        let expired = self
            .codes
            .values()
            .filter(|entry| now > entry.expires_at)
            .count();
        let used = self.codes.values().filter(|entry| entry.used).count();
        AccessCodeStats {
            total,
            active: total - expired,
            expired,
            used,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
