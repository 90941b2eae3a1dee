//! Built-in cloud directory role template identifiers.
//!
//! Roles are selected by template id, which is identical in every tenant. Ids are upper case, the
//! way the cloud mapper stores them.

pub const GLOBAL_ADMIN: &str = "62E90394-69F5-4237-9190-012177145E10";
pub const PRIVILEGED_ROLE_ADMIN: &str = "E8611AB8-C189-46E8-94E1-60213AB1F814";
pub const PRIVILEGED_AUTHENTICATION_ADMIN: &str = "7BE44C8A-ADAF-4E2A-84D6-AB2649E08A13";
pub const AUTHENTICATION_ADMIN: &str = "C4E39BD9-1100-46D3-8C65-FB160DA0071F";
pub const HELPDESK_ADMIN: &str = "729827E3-9C14-49F7-BB1B-9608F156BBB8";
pub const PASSWORD_ADMIN: &str = "966707D0-3269-4727-9BE2-8C3A10F19B9D";
pub const USER_ADMIN: &str = "FE930BE7-5E62-47DB-91AF-98C3A49A38B1";
/// Also grants tenant wide password resets
pub const PASSWORD_RESET_EXTRA: &str = "9980E02C-C2BE-4D73-94E8-173B1DC7CF3C";

pub const DIRECTORY_READERS: &str = "88D8E3E3-8F55-4A1E-953A-9B9898B8876B";
pub const GUEST_INVITER: &str = "95E79109-95C0-4D8E-AEE3-D01ACCF2D47B";
pub const MESSAGE_CENTER_READER: &str = "790C1FB9-7F7D-4F88-86A1-EF1F95C05C1B";
pub const REPORTS_READER: &str = "4A5D8F65-41DA-4DE4-8968-E035B65339CF";

pub const APPLICATION_ADMIN: &str = "9B895D92-2CD3-44C7-9D02-A6AC2D5EA5C3";
pub const CLOUD_APPLICATION_ADMIN: &str = "158C047A-C907-4556-B7EF-446551A6B5F7";
pub const INTUNE_ADMIN: &str = "3A2C62DB-5318-420D-8D74-23AFFEE5D9D5";

pub const GROUPS_ADMIN: &str = "FDD7A751-B60B-444A-984C-02652FE8FA1C";
pub const DIRECTORY_WRITERS: &str = "9360FEB5-F418-4BAA-8175-E2A00BAC4301";
pub const IDENTITY_GOVERNANCE_ADMIN: &str = "45D8D3C5-C802-45C6-B32A-1D70B5E1E86E";
pub const KNOWLEDGE_ADMIN: &str = "B5A8DCF3-09D5-43A9-A639-8E29EF291470";
pub const KNOWLEDGE_MANAGER: &str = "744EC460-397E-42AD-A462-8B3F9747A02C";

pub const HYBRID_IDENTITY_ADMIN: &str = "8AC3FC64-6ECA-42EA-9E69-59F4C7B60EB2";
pub const PARTNER_TIER1_SUPPORT: &str = "4BA39CA4-527C-499A-B93D-D9B492C50246";
pub const PARTNER_TIER2_SUPPORT: &str = "E00E864A-17C5-4A4B-9C06-F5B95A8D5BD8";
pub const DIRECTORY_SYNCHRONIZATION_ACCOUNTS: &str = "D29B2B05-8046-44BA-8758-1E26182FCF32";

/// Endpoint manager application ids of devices that accept Intune commands
pub const INTUNE_MDM_APP_IDS: [&str; 2] = [
    "54B943F8-D761-4F8D-951E-9CEA1846DB5A",
    "0000000A-0000-0000-C000-000000000000",
];

/// Roles that may reset passwords of users holding no admin role at all
pub const PASSWORD_RESET_ROLES: [&str; 7] = [
    AUTHENTICATION_ADMIN,
    GLOBAL_ADMIN,
    HELPDESK_ADMIN,
    PASSWORD_ADMIN,
    PRIVILEGED_AUTHENTICATION_ADMIN,
    USER_ADMIN,
    PASSWORD_RESET_EXTRA,
];

/// Roles that may reset the password of any user in their tenant
pub const RESET_ANY_PASSWORD_ROLES: [&str; 2] = [GLOBAL_ADMIN, PRIVILEGED_AUTHENTICATION_ADMIN];

/// Roles whose holders an Authentication Admin may reset
pub const AUTHENTICATION_ADMIN_TARGETS: [&str; 7] = [
    AUTHENTICATION_ADMIN,
    DIRECTORY_READERS,
    GUEST_INVITER,
    HELPDESK_ADMIN,
    MESSAGE_CENTER_READER,
    REPORTS_READER,
    PASSWORD_ADMIN,
];

/// Roles whose holders a Helpdesk Admin may reset.
///
/// Helpdesk and Authentication Admins may reset exactly the same roles.
pub const HELPDESK_ADMIN_TARGETS: [&str; 7] = AUTHENTICATION_ADMIN_TARGETS;

/// Roles whose holders a Password Admin may reset
pub const PASSWORD_ADMIN_TARGETS: [&str; 3] = [DIRECTORY_READERS, GUEST_INVITER, PASSWORD_ADMIN];

/// Roles whose holders a User Admin may reset
pub const USER_ADMIN_TARGETS: [&str; 6] = [
    DIRECTORY_READERS,
    GUEST_INVITER,
    HELPDESK_ADMIN,
    MESSAGE_CENTER_READER,
    REPORTS_READER,
    USER_ADMIN,
];

/// Roles that may add secrets to any tenant resident app or service principal
pub const ADD_SECRET_ROLES: [&str; 2] = [APPLICATION_ADMIN, CLOUD_APPLICATION_ADMIN];

/// Roles that may change membership of groups that cannot hold roles
pub const ADD_MEMBERS_ROLES: [&str; 9] = [
    GROUPS_ADMIN,
    GLOBAL_ADMIN,
    PRIVILEGED_ROLE_ADMIN,
    DIRECTORY_WRITERS,
    IDENTITY_GOVERNANCE_ADMIN,
    USER_ADMIN,
    INTUNE_ADMIN,
    KNOWLEDGE_ADMIN,
    KNOWLEDGE_MANAGER,
];

/// Roles that may change membership of role assignable groups
pub const ADD_ROLE_ASSIGNABLE_MEMBERS_ROLES: [&str; 2] = [GLOBAL_ADMIN, PRIVILEGED_ROLE_ADMIN];

/// Roles that may change owners of apps and service principals
pub const ADD_OWNER_ROLES: [&str; 4] = [
    HYBRID_IDENTITY_ADMIN,
    PARTNER_TIER1_SUPPORT,
    PARTNER_TIER2_SUPPORT,
    DIRECTORY_SYNCHRONIZATION_ACCOUNTS,
];
