use super::*;

impl PurgeCoordinator {
    /// Returns ids eligible for purge at `now`, oldest first.
    ///
    /// A missing, disabled or zero-ttl policy yields an empty plan.
    pub async fn plan(
        &self,
        tenant: &TenantId,
        resource: RetentionResource,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let limit = limit.min(self.max_ids_per_run);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(policy) = self.policies.get_policy(tenant, resource).await? else {
            debug!(tenant = %tenant, resource = %resource, "no retention policy, nothing to plan");
            return Ok(Vec::new());
        };

        let Some(cutoff) = policy.cutoff(now) else {
            return Ok(Vec::new());
        };

        if !self.targets.is_wired(resource) {
            debug!(tenant = %tenant, resource = %resource, "resource has no purge target");
            return Ok(Vec::new());
        }

        let mut ids = self
            .targets
            .target_for(resource)
            .list_expired(tenant, cutoff, limit)
            .await?;
        ids.truncate(limit);

        Ok(ids)
    }

    /// Runs an ad-hoc purge: explicit ids when given, else the current plan.
    pub async fn run_request(&self, request: PurgeRequest) -> AppResult<PurgeReceipt> {
        let tenant = TenantId::new(request.tenant)?;
        let resource = request.resource.parse::<RetentionResource>()?;
        let ids = match request.ids {
            Some(ids) => ids,
            None => {
                self.plan(&tenant, resource, now_epoch_seconds(), self.max_ids_per_run)
                    .await?
            }
        };

        self.execute(ExecutePurgeInput {
            tenant,
            resource,
            ids,
            dry_run: request.dry_run,
            actor: request.actor,
            mode: PurgeMode::from_label(request.mode.as_str()),
        })
        .await
    }
}
