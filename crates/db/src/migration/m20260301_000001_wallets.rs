//! Wallet ledger schema.
//!
//! Creates the wallet enums, the `wallets`, `wallet_transactions` and
//! `wallet_settlements` tables, their constraints and indexes, and the
//! trigger that keeps ledger rows immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TABLES
        // ============================================================
        db.execute_unprepared(WALLETS_SQL).await?;
        db.execute_unprepared(WALLET_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(WALLET_SETTLEMENTS_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Operational wallet status; 'closed' is terminal
CREATE TYPE wallet_status AS ENUM ('active', 'closed');

-- Kind of credit held
CREATE TYPE wallet_type AS ENUM ('prepaid', 'promotional');

-- Ledger direction
CREATE TYPE wallet_transaction_type AS ENUM ('credit', 'debit');

-- Ledger row outcome
CREATE TYPE wallet_transaction_status AS ENUM ('completed', 'failed');

-- Soft-delete marker
CREATE TYPE record_status AS ENUM ('published', 'deleted');

-- Settlement saga record
CREATE TYPE settlement_status AS ENUM ('pending', 'completed');
";

const WALLETS_SQL: &str = r"
CREATE TABLE wallets (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    customer_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    currency VARCHAR(3) NOT NULL,
    wallet_type wallet_type NOT NULL DEFAULT 'prepaid',
    wallet_status wallet_status NOT NULL DEFAULT 'active',
    balance NUMERIC(20, 8) NOT NULL DEFAULT 0,
    auto_top_up_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    auto_top_up_threshold NUMERIC(20, 8) NOT NULL DEFAULT 0,
    auto_top_up_amount NUMERIC(20, 8) NOT NULL DEFAULT 0,
    metadata JSONB NOT NULL DEFAULT '{}',
    status record_status NOT NULL DEFAULT 'published',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_by UUID,
    updated_by UUID,

    CONSTRAINT chk_wallets_balance_non_negative CHECK (balance >= 0),
    CONSTRAINT chk_wallets_currency CHECK (currency ~ '^[A-Z]{3}$'),
    CONSTRAINT chk_wallets_metadata_object CHECK (jsonb_typeof(metadata) = 'object'),
    CONSTRAINT chk_wallets_auto_top_up CHECK (
        auto_top_up_threshold >= 0
        AND auto_top_up_amount >= 0
        AND (NOT auto_top_up_enabled OR auto_top_up_amount > 0)
    )
);

CREATE INDEX idx_wallets_tenant_customer ON wallets (tenant_id, customer_id, created_at);

-- One active wallet per (customer, currency, type)
CREATE UNIQUE INDEX uq_wallets_active_customer_currency_type
    ON wallets (tenant_id, customer_id, currency, wallet_type)
    WHERE wallet_status = 'active' AND status = 'published';

-- Auto top-up candidates
CREATE INDEX idx_wallets_auto_top_up
    ON wallets (tenant_id)
    WHERE auto_top_up_enabled AND wallet_status = 'active' AND status = 'published';
";

const WALLET_TRANSACTIONS_SQL: &str = r"
CREATE TABLE wallet_transactions (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    wallet_id UUID NOT NULL REFERENCES wallets(id),
    transaction_type wallet_transaction_type NOT NULL,
    amount NUMERIC(20, 8) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    balance_before NUMERIC(20, 8) NOT NULL,
    balance_after NUMERIC(20, 8) NOT NULL,
    transaction_status wallet_transaction_status NOT NULL DEFAULT 'completed',
    reference_type VARCHAR(50) NOT NULL,
    reference_id VARCHAR(255) NOT NULL,
    description TEXT,
    metadata JSONB NOT NULL DEFAULT '{}',
    idempotency_key VARCHAR(255),
    status record_status NOT NULL DEFAULT 'published',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_by UUID,
    updated_by UUID,

    CONSTRAINT chk_wallet_tx_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_wallet_tx_snapshots_non_negative CHECK (balance_before >= 0 AND balance_after >= 0),
    CONSTRAINT chk_wallet_tx_snapshot_math CHECK (
        transaction_status <> 'completed'
        OR (transaction_type = 'credit' AND balance_after = balance_before + amount)
        OR (transaction_type = 'debit' AND balance_after = balance_before - amount)
    )
);

CREATE INDEX idx_wallet_tx_wallet_created ON wallet_transactions (tenant_id, wallet_id, created_at DESC, id DESC);
CREATE INDEX idx_wallet_tx_reference ON wallet_transactions (tenant_id, reference_type, reference_id);

-- Replay protection
CREATE UNIQUE INDEX uq_wallet_tx_idempotency
    ON wallet_transactions (tenant_id, wallet_id, idempotency_key)
    WHERE idempotency_key IS NOT NULL;
";

const WALLET_SETTLEMENTS_SQL: &str = r"
CREATE TABLE wallet_settlements (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    customer_id UUID NOT NULL,
    invoice_id VARCHAR(255) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    strategy VARCHAR(32) NOT NULL,
    amount_due NUMERIC(20, 8) NOT NULL,
    amount_collected NUMERIC(20, 8) NOT NULL DEFAULT 0,
    remaining_due NUMERIC(20, 8) NOT NULL,
    settlement_status settlement_status NOT NULL DEFAULT 'pending',
    wallet_results JSONB NOT NULL DEFAULT '[]',
    idempotency_key VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_by UUID,

    CONSTRAINT chk_settlements_amount_due_positive CHECK (amount_due > 0),
    CONSTRAINT chk_settlements_totals CHECK (
        amount_collected >= 0
        AND remaining_due >= 0
        AND amount_collected + remaining_due = amount_due
    )
);

CREATE INDEX idx_wallet_settlements_invoice ON wallet_settlements (tenant_id, invoice_id);

CREATE UNIQUE INDEX uq_wallet_settlements_idempotency
    ON wallet_settlements (tenant_id, idempotency_key)
    WHERE idempotency_key IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_wallet_transaction_mutation
-- Ledger rows are append-only; corrections are new rows
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_wallet_transaction_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'wallet_transactions rows are immutable. Write a compensating transaction instead.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_wallet_tx_mutation
BEFORE UPDATE OR DELETE ON wallet_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_wallet_transaction_mutation();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_prevent_wallet_tx_mutation ON wallet_transactions;
DROP FUNCTION IF EXISTS prevent_wallet_transaction_mutation();
DROP TABLE IF EXISTS wallet_settlements;
DROP TABLE IF EXISTS wallet_transactions;
DROP TABLE IF EXISTS wallets;
DROP TYPE IF EXISTS settlement_status;
DROP TYPE IF EXISTS record_status;
DROP TYPE IF EXISTS wallet_transaction_status;
DROP TYPE IF EXISTS wallet_transaction_type;
DROP TYPE IF EXISTS wallet_type;
DROP TYPE IF EXISTS wallet_status;
";
