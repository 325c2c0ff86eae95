//! Reference-data export: the login catalog and the `securities` verb.

use crate::error::Result;
use crate::params;
use crate::session::Session;
use common::User;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

impl Session {
    /// Admins get the extended record; everyone else the short one.
    /// Stateful transports stream one frame per security plus a
    /// terminator; stateless transports get a single array.
    pub(crate) fn on_securities(&self) -> Result<()> {
        let user = self.current_user()?;
        debug!("{}: securities requested", self.shared.addr);
        let mut out = Vec::new();
        for s in self.engines.securities.all() {
            let j = if user.is_admin {
                json!([
                    "security",
                    s.id,
                    s.symbol,
                    s.exchange,
                    s.sec_type,
                    s.multiplier,
                    s.close_price,
                    s.rate,
                    s.currency,
                    s.adv20,
                    s.market_cap,
                    s.sector.to_string(),
                    s.industry_group.to_string(),
                    s.industry.to_string(),
                    s.sub_industry.to_string(),
                    s.local_symbol,
                    s.bbgid,
                    s.cusip,
                    s.sedol,
                    s.isin
                ])
            } else {
                json!([
                    "security",
                    s.id,
                    s.symbol,
                    s.exchange,
                    s.sec_type,
                    s.lot_size,
                    s.multiplier
                ])
            };
            if self.stateless {
                out.push(j);
            } else {
                self.send(j);
            }
        }
        if self.stateless {
            self.send(Value::Array(out));
        } else {
            self.send(json!(["securities", "complete"]));
        }
        Ok(())
    }

    /// Stream the reference-data catalog, in catalog order: sub-accounts,
    /// the full user/sub-account matrix for admins, broker accounts, algo
    /// definitions, then the algo file listing.
    pub(crate) async fn export_reference_data(&self, user: &Arc<User>) {
        let accounts = &self.engines.accounts;
        for id in sorted(&user.sub_accounts) {
            if let Some(acc) = accounts.get_sub_account(id) {
                self.send(json!(["sub_account", acc.id, acc.name]));
            }
        }
        if user.is_admin {
            for u in accounts.users() {
                for id in sorted(&u.sub_accounts) {
                    if let Some(acc) = accounts.get_sub_account(id) {
                        self.send(json!(["user_sub_account", u.id, acc.id, acc.name]));
                    }
                }
            }
        }
        for b in accounts.broker_accounts() {
            self.send(json!(["broker_account", b.id, b.name]));
        }
        for adapter in self.engines.algos.adapters() {
            let mut frame = vec![json!("algo_def"), json!(adapter.name())];
            for p in adapter.param_defs() {
                let mut def = vec![json!(p.name)];
                params::encode_value(&p.default_value, &mut def);
                def.push(json!(p.required));
                def.push(json!(p.min_value));
                def.push(json!(p.max_value));
                def.push(json!(p.precision));
                frame.push(Value::Array(def));
            }
            self.send(Value::Array(frame));
        }
        let mut files = Vec::new();
        if let Ok(mut dir) = tokio::fs::read_dir(&self.engines.algo_dir).await {
            while let Ok(Some(entry)) = dir.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') || name.starts_with('_') {
                    continue;
                }
                files.push(name);
            }
        }
        if !files.is_empty() {
            files.sort();
            self.send(json!(["algoFiles", files]));
        }
    }
}

fn sorted(ids: &std::collections::HashSet<i64>) -> Vec<i64> {
    let mut out: Vec<i64> = ids.iter().copied().collect();
    out.sort_unstable();
    out
}
