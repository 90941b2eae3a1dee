//! Post-processing for on-premises directory data.
use std::collections::HashSet;

use async_trait::async_trait;
use houndload_core::{Fragment, GraphSession, Identifier, Params, Statement};
use indoc::indoc;
use itertools::Itertools as _;

use crate::{CallbackOutcome, PostProcessCallback, PostProcessStep};

/// Well known groups every domain user and computer belongs to: Everyone, Authenticated Users
pub const DOMAIN_USER_SIDS: [&str; 2] = ["S-1-1-0", "S-1-5-11"];

/// Links every principal in `$syncers` to the domain `$domainid` they can replicate
pub const DC_SYNC_EDGES: &str = indoc! {"
    UNWIND $syncers AS sync
    MATCH (n:Base {objectid: sync})
    MATCH (m:Domain {objectid: $domainid})
    MERGE (n)-[:DCSync {isacl: true, isinherited: false}]->(m)"};

/// Links every principal in `$syncers` to the LAPS enabled computers of domain `$domainid`
pub const SYNC_LAPS_PASSWORD_EDGES: &str = indoc! {"
    UNWIND $syncers AS sync
    MATCH (n:Base {objectid: sync})
    MATCH (m:Computer {domainsid: $domainid, haslaps: true})
    CALL {
        WITH n, m
        MERGE (n)-[:SyncLAPSPassword {isacl: true, isinherited: false}]->(m)
    } IN TRANSACTIONS OF 500 ROWS"};

/// The directory step list, in execution order
pub fn steps() -> Vec<PostProcessStep> {
    vec![
        PostProcessStep::query(
            "baseOwned",
            Statement::from_static(indoc! {"
                MATCH (n) WHERE (n:User OR n:Computer) AND n.owned IS NULL
                CALL { WITH n SET n.owned = false } IN TRANSACTIONS OF 500 ROWS"}),
        ),
        PostProcessStep::query(
            "baseHighValue",
            Statement::from_static(indoc! {"
                MATCH (n:Base) WHERE n.highvalue IS NULL
                CALL { WITH n SET n.highvalue = false } IN TRANSACTIONS OF 500 ROWS"}),
        ),
        PostProcessStep::query(
            "domainUserAssociation",
            Statement::from_static(indoc! {"
                MATCH (n:Group) WHERE n.objectid ENDS WITH '-513' OR n.objectid ENDS WITH '-515'
                WITH n UNWIND $sids AS sid
                MATCH (m:Group) WHERE m.objectid ENDS WITH sid
                MERGE (n)-[:MemberOf]->(m)"}),
        )
        .with_description("Domain Users and Domain Computers are members of Everyone and Authenticated Users")
        .with_params(Params::new().with("sids", DOMAIN_USER_SIDS.as_slice())),
        PostProcessStep::callback("postDCSync", DcSync),
    ]
}

/// Derives `DCSync` and `SyncLAPSPassword` edges.
///
/// A principal that holds `GetChanges` and `GetChangesAll` on a domain, directly or through group
/// membership, can replicate every secret of that domain. Holding `GetChanges` and
/// `GetChangesInFilteredSet` is enough to replicate LAPS passwords of the domain's computers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcSync;

impl DcSync {
    async fn principals(
        session: &dyn GraphSession,
        right: &'static str,
        domain: &str,
        outcome: &mut CallbackOutcome,
    ) -> Option<Vec<String>> {
        let right = Identifier::from_static(right);
        let statement = Statement::compose(&[
            Fragment::Text("MATCH (n)-[:MemberOf|"),
            Fragment::Ident(&right),
            Fragment::Text("*1..]->(:Domain {objectid: $objectid}) RETURN DISTINCT n.objectid AS objectid"),
        ]);

        match session
            .run(&statement, &Params::new().with("objectid", domain))
            .await
        {
            Ok(result) => {
                outcome.succeeded();
                Some(result.strings("objectid"))
            }
            Err(err) => {
                outcome.failed();
                tracing::error!(domain, %right, error = %err, "Failed to resolve principals");
                None
            }
        }
    }

    async fn merge(
        session: &dyn GraphSession,
        statement: &'static str,
        syncers: &[String],
        domain: &str,
        outcome: &mut CallbackOutcome,
    ) {
        let params = Params::new()
            .with("syncers", syncers)
            .with("domainid", domain);

        match session.run(&Statement::from_static(statement), &params).await {
            Ok(_) => outcome.succeeded(),
            Err(err) => {
                outcome.failed();
                tracing::error!(domain, error = %err, "Failed to create derived edges");
            }
        }
    }
}

/// Keeps the elements of `left` that also appear in `right`, in `left`'s order
fn intersect(left: &[String], right: &[String]) -> Vec<String> {
    let right = right.iter().map(String::as_str).collect::<HashSet<_>>();

    left.iter()
        .filter(|principal| right.contains(principal.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl PostProcessCallback for DcSync {
    async fn run(&self, session: &dyn GraphSession) -> CallbackOutcome {
        let mut outcome = CallbackOutcome::default();

        let domains = match session
            .run(
                &Statement::from_static("MATCH (n:Domain) RETURN n.objectid AS domainid"),
                &Params::new(),
            )
            .await
        {
            Ok(result) => {
                outcome.succeeded();
                result.strings("domainid")
            }
            Err(err) => {
                outcome.failed();
                tracing::error!(error = %err, "Failed to list domains");
                return outcome;
            }
        };

        for domain in &domains {
            let Some(get_changes) =
                Self::principals(session, "GetChanges", domain, &mut outcome).await
            else {
                continue;
            };
            let get_changes_all =
                Self::principals(session, "GetChangesAll", domain, &mut outcome).await;
            let filtered_set =
                Self::principals(session, "GetChangesInFilteredSet", domain, &mut outcome).await;

            if let Some(get_changes_all) = get_changes_all {
                let syncers = intersect(&get_changes, &get_changes_all);
                if !syncers.is_empty() {
                    tracing::info!(
                        "Found DC Sync principals: {} in domain {domain}",
                        syncers.iter().join(", ")
                    );
                    Self::merge(
                        session,
                        DC_SYNC_EDGES,
                        &syncers,
                        domain,
                        &mut outcome,
                    )
                    .await;
                }
            }

            if let Some(filtered_set) = filtered_set {
                let syncers = intersect(&get_changes, &filtered_set);
                if !syncers.is_empty() {
                    tracing::info!(
                        "Found SyncLAPSPassword principals: {} in domain {domain}",
                        syncers.iter().join(", ")
                    );
                    Self::merge(
                        session,
                        SYNC_LAPS_PASSWORD_EDGES,
                        &syncers,
                        domain,
                        &mut outcome,
                    )
                    .await;
                }
            }
        }

        outcome
    }
}
