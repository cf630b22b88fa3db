//! Tenant domain rules - statuses, intake records, approval overrides, and invariants.
//!
//! The lifecycle manager and both tenant stores share these helpers so that a tenant
//! looks the same regardless of which storage shape holds it.

use crate::{
    entities::tenant,
    errors::{Error, Result},
};
use chrono::Utc;
use std::{fmt, str::FromStr};

/// Longest logo URL accepted from the intake form; longer values are almost always
/// inlined image data.
pub const MAX_LOGO_URL_LEN: usize = 500;

/// Lifecycle state of a tenant, which is also the partition it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TenantStatus {
    /// Requested, awaiting admin review
    Pending,
    /// Approved and serving a storefront
    Active,
    /// Rejected by an admin; may be restored or deleted
    Declined,
}

impl TenantStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Active, Self::Declined];

    /// Stored representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "declined" => Ok(Self::Declined),
            other => Err(Error::Validation {
                message: format!("Unknown tenant status '{other}'"),
            }),
        }
    }
}

/// Parses the status column of a stored tenant.
pub fn status_of(tenant: &tenant::Model) -> Result<TenantStatus> {
    tenant.status.parse()
}

/// Derives a URL-safe slug from a requested store name.
///
/// Lowercases, drops anything that is not `[a-z0-9]`, whitespace, or `-`, turns
/// whitespace runs into single hyphens, collapses repeated hyphens, and trims
/// leading/trailing hyphens.
#[must_use]
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else if c.is_whitespace() || c == '-' {
            '-'
        } else {
            continue;
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }
    slug.trim_matches('-').to_string()
}

/// Drops logo URLs that are inlined data or oversized.
#[must_use]
pub fn sanitize_logo_url(logo_url: Option<String>) -> Option<String> {
    logo_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty() && !url.starts_with("data:") && url.len() <= MAX_LOGO_URL_LEN)
}

/// A store request as submitted through the intake form.
#[derive(Debug, Clone, Default)]
pub struct StoreRequest {
    /// Requested team / store name
    pub team_name: String,
    /// Contact person
    pub contact_name: String,
    /// Contact email
    pub contact_email: String,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Team type (e.g. `hockey`)
    pub team_type: Option<String>,
    /// Competitive level
    pub organization_level: Option<String>,
    /// City
    pub city: Option<String>,
    /// Province
    pub province: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Team size bracket
    pub team_size: Option<String>,
    /// Expected order volume bracket
    pub expected_volume: Option<String>,
    /// Requested turnaround
    pub urgency: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Hosted logo URL
    pub logo_url: Option<String>,
}

/// Builds the pending tenant record for a store request.
///
/// The id is freshly generated; slug and subdomain are both derived from the
/// team name.
pub fn new_pending_tenant(request: StoreRequest) -> Result<tenant::Model> {
    let team_name = request.team_name.trim().to_string();
    if team_name.is_empty()
        || request.contact_name.trim().is_empty()
        || request.contact_email.trim().is_empty()
    {
        return Err(Error::Validation {
            message: "Team name, contact name and contact email are required".to_string(),
        });
    }

    let slug = generate_slug(&team_name);
    if slug.is_empty() {
        return Err(Error::Validation {
            message: format!("Team name '{team_name}' does not produce a usable slug"),
        });
    }

    Ok(tenant::Model {
        id: format!("tenant_{}", uuid::Uuid::new_v4().simple()),
        name: team_name.clone(),
        store_name: team_name,
        subdomain: slug.clone(),
        slug,
        status: TenantStatus::Pending.as_str().to_string(),
        is_active: false,
        team_type: request.team_type,
        organization_level: request.organization_level,
        city: request.city,
        province: request.province,
        postal_code: request.postal_code,
        contact_name: request.contact_name.trim().to_string(),
        contact_email: request.contact_email.trim().to_string(),
        contact_phone: request.contact_phone,
        team_size: request.team_size,
        expected_volume: request.expected_volume,
        urgency: request.urgency,
        description: request.description,
        logo_url: sanitize_logo_url(request.logo_url),
        submitted_at: Utc::now(),
        created_at: None,
        approved_at: None,
        approved_by: None,
        declined_at: None,
        declined_by: None,
        decline_reason: None,
        website: None,
    })
}

/// Editable fields an admin may change while approving a request.
///
/// The tenant id is deliberately absent: it can never be overridden.
#[derive(Debug, Clone, Default)]
pub struct TenantOverrides {
    /// Organization name
    pub name: Option<String>,
    /// Storefront display name
    pub store_name: Option<String>,
    /// Slug; must already be URL-safe
    pub slug: Option<String>,
    /// Subdomain; must already be URL-safe
    pub subdomain: Option<String>,
    /// Contact person
    pub contact_name: Option<String>,
    /// Contact email
    pub contact_email: Option<String>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Logo URL
    pub logo_url: Option<String>,
    /// Team type
    pub team_type: Option<String>,
    /// Competitive level
    pub organization_level: Option<String>,
    /// City
    pub city: Option<String>,
    /// Province
    pub province: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Description
    pub description: Option<String>,
}

impl TenantOverrides {
    /// Merges the overrides onto a pending tenant record.
    pub fn apply_to(self, tenant: &mut tenant::Model) -> Result<()> {
        for candidate in [&self.slug, &self.subdomain].into_iter().flatten() {
            if candidate.is_empty() || generate_slug(candidate) != *candidate {
                return Err(Error::Validation {
                    message: format!("'{candidate}' is not a valid slug"),
                });
            }
        }
        if self
            .contact_email
            .as_deref()
            .is_some_and(|email| email.trim().is_empty())
        {
            return Err(Error::Validation {
                message: "Contact email cannot be empty".to_string(),
            });
        }

        if let Some(name) = self.name {
            tenant.name = name;
        }
        if let Some(store_name) = self.store_name {
            tenant.store_name = store_name;
        }
        if let Some(slug) = self.slug {
            tenant.slug = slug;
        }
        if let Some(subdomain) = self.subdomain {
            tenant.subdomain = subdomain;
        }
        if let Some(contact_name) = self.contact_name {
            tenant.contact_name = contact_name;
        }
        if let Some(contact_email) = self.contact_email {
            tenant.contact_email = contact_email;
        }
        if self.contact_phone.is_some() {
            tenant.contact_phone = self.contact_phone;
        }
        if self.logo_url.is_some() {
            tenant.logo_url = sanitize_logo_url(self.logo_url);
        }
        if self.team_type.is_some() {
            tenant.team_type = self.team_type;
        }
        if self.organization_level.is_some() {
            tenant.organization_level = self.organization_level;
        }
        if self.city.is_some() {
            tenant.city = self.city;
        }
        if self.province.is_some() {
            tenant.province = self.province;
        }
        if self.postal_code.is_some() {
            tenant.postal_code = self.postal_code;
        }
        if self.description.is_some() {
            tenant.description = self.description;
        }
        Ok(())
    }
}

/// Verifies the cross-field invariants every stored tenant must satisfy.
///
/// `is_active` and `website` track `status == active`. An active tenant carries
/// `approved_at`/`approved_by` and a declined one `declined_at`/`declined_by`; neither
/// set of audit fields may appear in any other state. `decline_reason` is optional.
pub fn check_invariants(tenant: &tenant::Model) -> Result<()> {
    let status = status_of(tenant)?;
    let active = status == TenantStatus::Active;
    let declined = status == TenantStatus::Declined;

    let violation = if tenant.is_active != active {
        Some("is_active does not match status")
    } else if tenant.website.is_some() != active {
        Some("website must be present exactly when active")
    } else if active && (tenant.approved_at.is_none() || tenant.approved_by.is_none()) {
        Some("active tenant is missing its approval audit fields")
    } else if !active && (tenant.approved_at.is_some() || tenant.approved_by.is_some()) {
        Some("approval audit fields on a non-active tenant")
    } else if declined && (tenant.declined_at.is_none() || tenant.declined_by.is_none()) {
        Some("declined tenant is missing its decline audit fields")
    } else if !declined
        && (tenant.declined_at.is_some()
            || tenant.declined_by.is_some()
            || tenant.decline_reason.is_some())
    {
        Some("decline audit fields on a non-declined tenant")
    } else {
        None
    };

    violation.map_or(Ok(()), |message| {
        Err(Error::Validation {
            message: format!("Tenant {}: {message}", tenant.id),
        })
    })
}
