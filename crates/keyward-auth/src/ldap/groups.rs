//! Nested group resolution
//!
//! Walks group membership breadth first, starting from the groups that list
//! the user directly. Every group is recorded in `visited` (by normalized DN)
//! before its own parents are searched, so membership cycles terminate.
//! Searches within one level run concurrently; their results are folded into
//! `visited` by this task alone once the level completes.

use crate::ldap::client::DirectoryClient;
use crate::ldap::types::*;
use futures::{stream, StreamExt, TryStreamExt};
use keyward_core::config::{GroupSearchConfig, ScopeMappingPolicy};
use keyward_core::types::ScopeSet;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct GroupResolver {
    client: Arc<dyn DirectoryClient>,
    policy: ScopeMappingPolicy,
    search_base: String,
    search_filter: String,
    scope_attribute: String,
    member_attribute: String,
    max_depth: u32,
    max_concurrent_searches: usize,
}

impl GroupResolver {
    /// Expects a validated configuration
    pub fn new(client: Arc<dyn DirectoryClient>, config: &GroupSearchConfig) -> Self {
        Self {
            client,
            policy: config.policy,
            search_base: config.search_base.clone(),
            search_filter: config.search_filter.clone(),
            scope_attribute: config.scope_attribute.clone(),
            member_attribute: config.member_attribute.clone(),
            max_depth: config.max_depth(),
            max_concurrent_searches: config.max_concurrent_searches.max(1),
        }
    }

    pub fn policy(&self) -> ScopeMappingPolicy {
        self.policy
    }

    /// Scopes granted to `user_dn` through (possibly nested) group membership.
    ///
    /// Any failed search fails the whole resolution.
    pub async fn resolve_scopes(&self, user_dn: &str) -> DirectoryResult<ScopeSet> {
        if self.policy == ScopeMappingPolicy::NoMapping {
            return Ok(ScopeSet::new());
        }

        let groups = self.resolve_groups(user_dn).await?;
        Ok(groups
            .iter()
            .filter_map(|group| self.scope_for(group))
            .collect())
    }

    /// Every group reachable from `user_dn` within the depth bound
    pub async fn resolve_groups(&self, user_dn: &str) -> DirectoryResult<Vec<GroupNode>> {
        let mut visited = HashSet::new();
        let mut groups = Vec::new();
        let mut frontier = vec![user_dn.to_string()];
        let mut level = 0;

        loop {
            let found: Vec<Vec<DirectoryEntry>> = stream::iter(std::mem::take(&mut frontier))
                .map(|member| async move { self.groups_with_member(&member).await })
                .buffer_unordered(self.max_concurrent_searches)
                .try_collect()
                .await?;

            let mut next = Vec::new();
            for entry in found.into_iter().flatten() {
                if !visited.insert(normalize_dn(&entry.dn)) {
                    continue;
                }

                let group = GroupNode::from_entry(
                    &entry,
                    level,
                    &self.scope_attribute,
                    &self.member_attribute,
                );
                next.push(group.dn.clone());
                groups.push(group);
            }

            debug!(level, discovered = next.len(), "Group search level complete");

            if next.is_empty() || level >= self.max_depth {
                break;
            }

            frontier = next;
            level += 1;
        }

        debug!(user_dn, groups = groups.len(), "Resolved group membership");
        Ok(groups)
    }

    async fn groups_with_member(&self, member_dn: &str) -> DirectoryResult<Vec<DirectoryEntry>> {
        let filter = build_member_filter(&self.search_filter, member_dn);
        self.client
            .search(
                &self.search_base,
                &filter,
                &[self.scope_attribute.as_str(), self.member_attribute.as_str()],
            )
            .await
    }

    /// Zero or one scope per group, from the group entry alone
    fn scope_for(&self, group: &GroupNode) -> Option<String> {
        match self.policy {
            ScopeMappingPolicy::NoMapping => None,
            ScopeMappingPolicy::GroupNameAsScope => group.name.clone(),
        }
    }
}
