// src/constants.rs
//! Vocabulary shared by every participant of the protocol.

/// W3C Verifiable Credentials context.
pub const CONTEXT_VC_W3C: &str = "https://www.w3.org/2018/credentials/v1";
/// Static context for access credentials.
pub const CONTEXT_ACCESS_GRANT: &str = "https://schema.inrupt.com/credentials/v1.jsonld";

pub const CREDENTIAL_TYPE_BASE: &str = "VerifiableCredential";
pub const CREDENTIAL_TYPE_ACCESS_REQUEST: &str = "SolidAccessRequest";
pub const CREDENTIAL_TYPE_ACCESS_GRANT: &str = "SolidAccessGrant";
pub const CREDENTIAL_TYPE_ACCESS_DENIAL: &str = "SolidAccessDenial";

/// Lifecycle tags; a credential carries exactly one of them.
pub const LIFECYCLE_TYPES: [&str; 3] = [
    CREDENTIAL_TYPE_ACCESS_REQUEST,
    CREDENTIAL_TYPE_ACCESS_GRANT,
    CREDENTIAL_TYPE_ACCESS_DENIAL,
];

pub const GC_CONSENT_STATUS_REQUESTED: &str = "https://w3id.org/GConsent#ConsentStatusRequested";
pub const GC_CONSENT_STATUS_EXPLICITLY_GIVEN: &str =
    "https://w3id.org/GConsent#ConsentStatusExplicitlyGiven";
pub const GC_CONSENT_STATUS_DENIED: &str = "https://w3id.org/GConsent#ConsentStatusDenied";

pub const ACL_READ: &str = "http://www.w3.org/ns/auth/acl#Read";
pub const ACL_WRITE: &str = "http://www.w3.org/ns/auth/acl#Write";
pub const ACL_APPEND: &str = "http://www.w3.org/ns/auth/acl#Append";

/// Key of the management agent endpoint in a well-known discovery document.
pub const PREFERRED_MANAGEMENT_UI: &str = "http://inrupt.com/ns/ess#ConsentManagementUI";
pub const WELL_KNOWN_SOLID: &str = ".well-known/solid";

/// Query parameter carrying the credential reference across a redirect.
///
/// Both ends of the handoff read and write this exact name.
pub const HANDOFF_PARAM: &str = "accessCredential";
/// Query parameter pointing back at the party that initiated the redirect.
pub const REDIRECT_URL_PARAM: &str = "redirectUrl";

/// Status entry type written when flipping a status bit.
pub const REVOCATION_STATUS_TYPE: &str = "RevocationList2020Status";
