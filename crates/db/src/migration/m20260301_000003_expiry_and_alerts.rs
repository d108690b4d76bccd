//! Credit expiry and low-balance alerts.
//!
//! Adds `expires_at` to credits, the `wallet_credit_expiries` table recording
//! which expired credits a run has processed, and the alert columns on
//! `wallets`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(CREDIT_EXPIRY_SQL).await?;
        db.execute_unprepared(BALANCE_ALERTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const CREDIT_EXPIRY_SQL: &str = r"
ALTER TABLE wallet_transactions ADD COLUMN expires_at TIMESTAMPTZ;

ALTER TABLE wallet_transactions ADD CONSTRAINT chk_wallet_tx_expiry_on_credit
    CHECK (expires_at IS NULL OR transaction_type = 'credit');

-- Expiry candidates
CREATE INDEX idx_wallet_tx_expiring
    ON wallet_transactions (tenant_id, expires_at)
    WHERE expires_at IS NOT NULL;

-- One row per processed credit, including credits that were fully spent
CREATE TABLE wallet_credit_expiries (
    transaction_id UUID PRIMARY KEY REFERENCES wallet_transactions(id),
    tenant_id UUID NOT NULL,
    wallet_id UUID NOT NULL REFERENCES wallets(id),
    expired_amount NUMERIC(20, 8) NOT NULL,
    debit_transaction_id UUID REFERENCES wallet_transactions(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_credit_expiries_amount CHECK (
        expired_amount >= 0
        AND ((expired_amount = 0) = (debit_transaction_id IS NULL))
    )
);

ALTER TABLE wallet_credit_expiries ENABLE ROW LEVEL SECURITY;
ALTER TABLE wallet_credit_expiries FORCE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON wallet_credit_expiries
    USING (tenant_id = current_setting('app.current_tenant_id', true)::UUID);
";

const BALANCE_ALERTS_SQL: &str = r"
CREATE TYPE wallet_alert_state AS ENUM ('ok', 'in_alarm');

ALTER TABLE wallets
    ADD COLUMN alert_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    ADD COLUMN alert_threshold NUMERIC(20, 8) NOT NULL DEFAULT 0,
    ADD COLUMN alert_state wallet_alert_state NOT NULL DEFAULT 'ok',
    ADD CONSTRAINT chk_wallets_alert_threshold CHECK (alert_threshold >= 0);

-- Alert check candidates
CREATE INDEX idx_wallets_alert
    ON wallets (tenant_id)
    WHERE alert_enabled AND wallet_status = 'active' AND status = 'published';
";

const DROP_SQL: &str = r"
DROP INDEX IF EXISTS idx_wallets_alert;
ALTER TABLE wallets
    DROP CONSTRAINT IF EXISTS chk_wallets_alert_threshold,
    DROP COLUMN IF EXISTS alert_state,
    DROP COLUMN IF EXISTS alert_threshold,
    DROP COLUMN IF EXISTS alert_enabled;
DROP TYPE IF EXISTS wallet_alert_state;

DROP POLICY IF EXISTS tenant_isolation ON wallet_credit_expiries;
DROP TABLE IF EXISTS wallet_credit_expiries;
DROP INDEX IF EXISTS idx_wallet_tx_expiring;
ALTER TABLE wallet_transactions DROP CONSTRAINT IF EXISTS chk_wallet_tx_expiry_on_credit;
ALTER TABLE wallet_transactions DROP COLUMN IF EXISTS expires_at;
";
