//! Row-level security for the wallet tables.
//!
//! Every wallet table is scoped by `tenant_id` against the
//! `app.current_tenant_id` setting, which `TenantTransaction` sets with
//! `SET LOCAL`. FORCE makes the policies apply to the table owner too.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(RLS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_RLS_SQL).await?;
        Ok(())
    }
}

const RLS_SQL: &str = r"
-- ============================================================
-- ROW-LEVEL SECURITY POLICIES
-- Application sets context per transaction:
--   SET LOCAL app.current_tenant_id = 'tenant-uuid';
-- ============================================================

ALTER TABLE wallets ENABLE ROW LEVEL SECURITY;
ALTER TABLE wallet_transactions ENABLE ROW LEVEL SECURITY;
ALTER TABLE wallet_settlements ENABLE ROW LEVEL SECURITY;

ALTER TABLE wallets FORCE ROW LEVEL SECURITY;
ALTER TABLE wallet_transactions FORCE ROW LEVEL SECURITY;
ALTER TABLE wallet_settlements FORCE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON wallets
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON wallet_transactions
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);

CREATE POLICY tenant_isolation ON wallet_settlements
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);
";

const DROP_RLS_SQL: &str = r"
DROP POLICY IF EXISTS tenant_isolation ON wallet_settlements;
DROP POLICY IF EXISTS tenant_isolation ON wallet_transactions;
DROP POLICY IF EXISTS tenant_isolation ON wallets;

ALTER TABLE wallet_settlements NO FORCE ROW LEVEL SECURITY;
ALTER TABLE wallet_transactions NO FORCE ROW LEVEL SECURITY;
ALTER TABLE wallets NO FORCE ROW LEVEL SECURITY;

ALTER TABLE wallet_settlements DISABLE ROW LEVEL SECURITY;
ALTER TABLE wallet_transactions DISABLE ROW LEVEL SECURITY;
ALTER TABLE wallets DISABLE ROW LEVEL SECURITY;
";
