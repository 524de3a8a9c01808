//! JSON file store for certificate requests, devices and distribution links.
//!
//! Every operation loads the whole file under one mutex and, for mutations,
//! writes it back through `<file>.tmp` plus rename so readers never see a
//! partial document. A missing file or one that is not a JSON object reads as
//! empty; individual records with odd field types are kept (see `models`).

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rand::{rngs::OsRng, RngCore};
use std::{
    cmp::Reverse,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{
    AuditRecord, CertRequest, Device, DeviceStatus, Distribution, DistributionLink, LinkStatus,
    RequestStatus, StoreState,
};

/// Shortest lifetime a distribution link can be created with.
pub const MIN_LINK_TTL_SEC: i64 = 60;
/// Longest lifetime a distribution link can be created with (one year).
pub const MAX_LINK_TTL_SEC: i64 = 365 * 24 * 60 * 60;
const LINK_TOKEN_BYTES: usize = 24;
pub const DISTRIBUTION_PATH_PREFIX: &str = "/api/certs/distribution/";

const MANUAL_STEPS: [&str; 3] = [
    "1. Get the .p12 file from the person handling distribution.",
    "2. Open the file on the iPhone and install the configuration profile.",
    "3. After installing, open the target URL in Safari to confirm access.",
];

#[derive(Debug, Error)]
pub enum CertStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to generate link token: {0}")]
    Token(String),
}

pub struct NewRequest<'a> {
    pub device_name: &'a str,
    pub platform: &'a str,
    pub note: &'a str,
}

pub struct IssueDetails<'a> {
    pub issued_at: &'a str,
    pub expires_at: &'a str,
    pub cert_cn: &'a str,
}

#[derive(Debug)]
pub struct CertStore {
    path: PathBuf,
    lock: Mutex<()>,
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn link_token() -> Result<String, CertStoreError> {
    let mut bytes = [0u8; LINK_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| CertStoreError::Token(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn audit(
    state: &mut StoreState,
    now: DateTime<Utc>,
    actor: &str,
    action: &str,
    target: (&str, &str),
    detail: String,
) {
    let (target_type, target_id) = target;
    state.audit.push(AuditRecord {
        id: new_id(),
        at: iso(now),
        actor: actor.to_string(),
        action: action.to_string(),
        target_type: target_type.to_string(),
        target_id: target_id.to_string(),
        detail,
    });
}

/// Mark active links whose expiry has passed. Returns true if any changed.
fn expire_links(state: &mut StoreState, now: DateTime<Utc>) -> bool {
    let mut changed = false;
    for link in &mut state.links {
        if link.status != LinkStatus::Active {
            continue;
        }
        if parse_iso(&link.expires_at).is_some_and(|expires_at| expires_at <= now) {
            link.status = LinkStatus::Expired;
            changed = true;
        }
    }
    changed
}

impl CertStore {
    /// Open the store at `path`, creating its parent directory.
    ///
    /// # Errors
    /// Returns [`CertStoreError::Io`] when the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CertStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CertStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> StoreState {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("cert store {} not readable: {err}", self.path.display());
                return StoreState::default();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|err| {
            warn!("cert store {} is corrupt, starting empty: {err}", self.path.display());
            StoreState::default()
        })
    }

    fn save(&self, state: &StoreState) -> Result<(), CertStoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, body).map_err(|source| CertStoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| CertStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Devices, most recently updated first.
    #[must_use]
    pub fn list_devices(&self) -> Vec<Device> {
        let _guard = self.guard();
        let mut devices = self.load().devices;
        devices.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        devices
    }

    /// Requests, newest first.
    #[must_use]
    pub fn list_requests(&self) -> Vec<CertRequest> {
        let _guard = self.guard();
        let mut requests = self.load().requests;
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests
    }

    /// Links, newest first. Active links past their expiry are marked
    /// expired and persisted.
    ///
    /// # Errors
    /// Returns [`CertStoreError`] if persisting expired links fails.
    pub fn list_links(&self) -> Result<Vec<DistributionLink>, CertStoreError> {
        self.list_links_at(Utc::now())
    }

    /// # Errors
    /// See [`CertStore::list_links`].
    pub fn list_links_at(&self, now: DateTime<Utc>) -> Result<Vec<DistributionLink>, CertStoreError> {
        let _guard = self.guard();
        let mut state = self.load();
        if expire_links(&mut state, now) {
            self.save(&state)?;
        }
        let mut links = state.links;
        links.sort_by_key(|link| Reverse(link.created_at.clone()));
        Ok(links)
    }

    /// Audit records, newest first.
    #[must_use]
    pub fn list_audit(&self) -> Vec<AuditRecord> {
        let _guard = self.guard();
        let mut audit = self.load().audit;
        audit.sort_by(|a, b| b.at.cmp(&a.at));
        audit
    }

    /// # Errors
    /// Returns [`CertStoreError`] if the store cannot be written.
    pub fn create_request(
        &self,
        actor: &str,
        request: &NewRequest<'_>,
    ) -> Result<CertRequest, CertStoreError> {
        let now = Utc::now();
        let record = CertRequest {
            id: new_id(),
            device_name: request.device_name.to_string(),
            platform: request.platform.to_string(),
            note: request.note.to_string(),
            status: RequestStatus::Requested,
            requested_at: iso(now),
            ..CertRequest::default()
        };

        let _guard = self.guard();
        let mut state = self.load();
        state.requests.push(record.clone());
        audit(
            &mut state,
            now,
            actor,
            "request.create",
            ("request", &record.id),
            format!("device_name={}", record.device_name),
        );
        self.save(&state)?;
        Ok(record)
    }

    /// Mark a request issued and create or refresh the device bound to it.
    /// Returns `None` for an unknown request.
    ///
    /// # Errors
    /// Returns [`CertStoreError`] if the store cannot be written.
    pub fn mark_request_issued(
        &self,
        actor: &str,
        request_id: &str,
        issue: &IssueDetails<'_>,
    ) -> Result<Option<CertRequest>, CertStoreError> {
        let _guard = self.guard();
        let mut state = self.load();
        let now = Utc::now();
        let stamp = iso(now);

        let Some(position) = state.requests.iter().position(|req| req.id == request_id) else {
            return Ok(None);
        };

        let device_id = match state
            .devices
            .iter_mut()
            .find(|device| device.request_id == request_id)
        {
            Some(device) => {
                device.cert_cn = issue.cert_cn.to_string();
                device.issued_at = issue.issued_at.to_string();
                device.expires_at = issue.expires_at.to_string();
                device.status = DeviceStatus::Active;
                device.updated_at.clone_from(&stamp);
                device.id.clone()
            }
            None => {
                let request = &state.requests[position];
                let device = Device {
                    id: new_id(),
                    request_id: request_id.to_string(),
                    name: request.device_name.clone(),
                    platform: request.platform.clone(),
                    cert_cn: issue.cert_cn.to_string(),
                    issued_at: issue.issued_at.to_string(),
                    expires_at: issue.expires_at.to_string(),
                    status: DeviceStatus::Active,
                    created_at: stamp.clone(),
                    updated_at: stamp,
                };
                let id = device.id.clone();
                state.devices.push(device);
                id
            }
        };

        let request = &mut state.requests[position];
        request.status = RequestStatus::Issued;
        request.issued_at = issue.issued_at.to_string();
        request.expires_at = issue.expires_at.to_string();
        request.device_id.clone_from(&device_id);
        let updated = request.clone();

        audit(
            &mut state,
            now,
            actor,
            "request.mark_issued",
            ("request", request_id),
            format!("device_id={device_id}"),
        );
        self.save(&state)?;
        Ok(Some(updated))
    }

    /// Create a distribution link for a request. The lifetime is clamped to
    /// [`MIN_LINK_TTL_SEC`]..=[`MAX_LINK_TTL_SEC`]. Returns `None` for an
    /// unknown request.
    ///
    /// # Errors
    /// Returns [`CertStoreError`] if the token cannot be generated or the
    /// store cannot be written.
    pub fn create_distribution_link(
        &self,
        actor: &str,
        request_id: &str,
        expires_in_sec: i64,
        note: &str,
    ) -> Result<Option<DistributionLink>, CertStoreError> {
        let _guard = self.guard();
        let mut state = self.load();
        if !state.requests.iter().any(|req| req.id == request_id) {
            return Ok(None);
        }

        let now = Utc::now();
        let ttl = ChronoDuration::seconds(expires_in_sec.clamp(MIN_LINK_TTL_SEC, MAX_LINK_TTL_SEC));
        let token = link_token()?;
        let link = DistributionLink {
            id: new_id(),
            request_id: request_id.to_string(),
            distribution_url_path: format!("{DISTRIBUTION_PATH_PREFIX}{token}"),
            token,
            status: LinkStatus::Active,
            created_at: iso(now),
            expires_at: iso(now + ttl),
            note: note.to_string(),
        };
        state.links.push(link.clone());
        audit(
            &mut state,
            now,
            actor,
            "link.create",
            ("link", &link.id),
            format!("request_id={request_id}"),
        );
        self.save(&state)?;
        Ok(Some(link))
    }

    /// Returns `None` for an unknown link.
    ///
    /// # Errors
    /// Returns [`CertStoreError`] if the store cannot be written.
    pub fn revoke_link(
        &self,
        actor: &str,
        link_id: &str,
    ) -> Result<Option<DistributionLink>, CertStoreError> {
        let _guard = self.guard();
        let mut state = self.load();
        let Some(link) = state.links.iter_mut().find(|link| link.id == link_id) else {
            return Ok(None);
        };
        link.status = LinkStatus::Revoked;
        let revoked = link.clone();

        audit(
            &mut state,
            Utc::now(),
            actor,
            "link.revoke",
            ("link", link_id),
            String::new(),
        );
        self.save(&state)?;
        Ok(Some(revoked))
    }

    /// Resolve an active, unexpired link token. An expired link is marked as
    /// such on the way out.
    ///
    /// # Errors
    /// Returns [`CertStoreError`] if marking an expired link fails.
    pub fn resolve_distribution_token(
        &self,
        token: &str,
    ) -> Result<Option<Distribution>, CertStoreError> {
        self.resolve_distribution_token_at(token, Utc::now())
    }

    /// # Errors
    /// See [`CertStore::resolve_distribution_token`].
    pub fn resolve_distribution_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Distribution>, CertStoreError> {
        if token.is_empty() {
            return Ok(None);
        }
        let _guard = self.guard();
        let mut state = self.load();
        let Some(link) = state.links.iter_mut().find(|link| link.token == token) else {
            return Ok(None);
        };
        if link.status != LinkStatus::Active {
            return Ok(None);
        }
        if !parse_iso(&link.expires_at).is_some_and(|expires_at| expires_at > now) {
            link.status = LinkStatus::Expired;
            self.save(&state)?;
            return Ok(None);
        }

        let request_id = link.request_id.clone();
        Ok(state
            .requests
            .iter()
            .find(|req| req.id == request_id)
            .map(|req| Distribution {
                request_id: req.id.clone(),
                device_name: req.device_name.clone(),
                platform: req.platform.clone(),
                note: req.note.clone(),
                status: req.status,
                manual_steps: MANUAL_STEPS.iter().map(ToString::to_string).collect(),
            }))
    }
}
