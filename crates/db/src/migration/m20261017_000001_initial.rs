//! Initial database migration.
//!
//! Creates the wallet, transaction, subscription, coupon, referral, and
//! exchange-rate tables together with their checks, indexes, and triggers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ACCOUNTS & WALLETS
        // ============================================================
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 2: TRANSACTIONS
        // ============================================================
        db.execute_unprepared(TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 3: PLANS & SUBSCRIPTIONS
        // ============================================================
        db.execute_unprepared(PLANS_SQL).await?;
        db.execute_unprepared(USER_PLANS_SQL).await?;

        // ============================================================
        // PART 4: COUPONS & REFERRALS
        // ============================================================
        db.execute_unprepared(COUPONS_SQL).await?;
        db.execute_unprepared(COUPON_REDEMPTIONS_SQL).await?;
        db.execute_unprepared(REFERRALS_SQL).await?;

        // ============================================================
        // PART 5: EXCHANGE RATES
        // ============================================================
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS & FUNCTIONS
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

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    username VARCHAR(32) NOT NULL,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    role TEXT NOT NULL DEFAULT 'user'
        CHECK (role IN ('super_admin', 'admin', 'moderator', 'manager', 'support', 'user')),
    is_active BOOLEAN NOT NULL DEFAULT true,
    wallet_balance NUMERIC(20, 2) NOT NULL DEFAULT 0,
    currency CHAR(3) NOT NULL DEFAULT 'NGN',
    referral_code VARCHAR(16) NOT NULL UNIQUE,
    referred_by UUID REFERENCES users(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    -- A wallet can never go negative
    CONSTRAINT chk_wallet_balance_non_negative CHECK (wallet_balance >= 0)
);

CREATE UNIQUE INDEX idx_users_username_ci ON users(LOWER(username));
CREATE UNIQUE INDEX idx_users_email_ci ON users(LOWER(email));
CREATE INDEX idx_users_referred_by ON users(referred_by) WHERE referred_by IS NOT NULL;
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES users(id),
    transaction_type TEXT NOT NULL
        CHECK (transaction_type IN ('deposit', 'withdrawal', 'exchange', 'transfer', 'referral', 'subscription')),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'completed', 'failed', 'cancelled')),
    amount NUMERIC(20, 2) NOT NULL,
    currency CHAR(3) NOT NULL,
    target_currency CHAR(3),
    exchange_rate NUMERIC(20, 8),
    fees NUMERIC(20, 2) NOT NULL DEFAULT 0,
    reference VARCHAR(100) UNIQUE,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    processed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_transaction_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_transaction_fees_non_negative CHECK (fees >= 0)
);

CREATE INDEX idx_transactions_user_created ON transactions(user_id, created_at DESC);
CREATE INDEX idx_transactions_pending ON transactions(created_at)
    WHERE status = 'pending' AND reference IS NOT NULL;
CREATE INDEX idx_transactions_type_status ON transactions(transaction_type, status);
";

const PLANS_SQL: &str = r"
CREATE TABLE plans (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(100) NOT NULL UNIQUE,
    description TEXT,
    price NUMERIC(20, 2) NOT NULL,
    currency CHAR(3) NOT NULL DEFAULT 'NGN',
    features JSONB NOT NULL DEFAULT '[]'::jsonb,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'active', 'inactive')),
    referral_commission_rate NUMERIC(5, 2) NOT NULL DEFAULT 0,
    duration_days INTEGER NOT NULL DEFAULT 30,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_plan_price_non_negative CHECK (price >= 0),
    CONSTRAINT chk_plan_commission_range CHECK (referral_commission_rate BETWEEN 0 AND 100),
    CONSTRAINT chk_plan_duration_positive CHECK (duration_days > 0)
);
";

const USER_PLANS_SQL: &str = r"
CREATE TABLE user_plans (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES users(id),
    plan_id UUID NOT NULL REFERENCES plans(id),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('active', 'cancelled', 'expired', 'pending')),
    started_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ NOT NULL,
    transaction_id UUID REFERENCES transactions(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_user_plan_window CHECK (expires_at > started_at)
);

-- At most one active subscription per user
CREATE UNIQUE INDEX idx_user_plans_one_active ON user_plans(user_id) WHERE status = 'active';
CREATE INDEX idx_user_plans_user ON user_plans(user_id, created_at DESC);
";

const COUPONS_SQL: &str = r"
CREATE TABLE coupons (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(50) NOT NULL UNIQUE,
    coupon_type TEXT NOT NULL
        CHECK (coupon_type IN ('percentage', 'fixed', 'free_trial')),
    value NUMERIC(20, 2) NOT NULL DEFAULT 0,
    max_redemptions INTEGER,
    usage_count INTEGER NOT NULL DEFAULT 0,
    min_purchase_amount NUMERIC(20, 2),
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'inactive')),
    starts_at TIMESTAMPTZ,
    ends_at TIMESTAMPTZ,
    is_stackable BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_coupon_code_upper CHECK (code = UPPER(code)),
    CONSTRAINT chk_coupon_usage_non_negative CHECK (usage_count >= 0),
    CONSTRAINT chk_coupon_usage_limit CHECK (max_redemptions IS NULL OR usage_count <= max_redemptions),
    CONSTRAINT chk_coupon_window CHECK (starts_at IS NULL OR ends_at IS NULL OR ends_at >= starts_at)
);
";

const COUPON_REDEMPTIONS_SQL: &str = r"
CREATE TABLE coupon_redemptions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    coupon_id UUID NOT NULL REFERENCES coupons(id),
    user_id UUID NOT NULL REFERENCES users(id),
    transaction_id UUID REFERENCES transactions(id),
    discount_value NUMERIC(20, 2) NOT NULL,
    final_amount NUMERIC(20, 2) NOT NULL,
    status TEXT NOT NULL DEFAULT 'applied'
        CHECK (status IN ('applied', 'reversed')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_coupon_redemptions_coupon ON coupon_redemptions(coupon_id);
CREATE INDEX idx_coupon_redemptions_transaction ON coupon_redemptions(transaction_id)
    WHERE transaction_id IS NOT NULL;
";

const REFERRALS_SQL: &str = r"
CREATE TABLE referrals (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    referrer_id UUID NOT NULL REFERENCES users(id),
    referred_id UUID NOT NULL UNIQUE REFERENCES users(id),
    commission_amount NUMERIC(20, 2) NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'rewarded', 'cancelled')),
    transaction_id UUID REFERENCES transactions(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_referral_not_self CHECK (referrer_id <> referred_id)
);

CREATE INDEX idx_referrals_referrer ON referrals(referrer_id);
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    base_currency CHAR(3) NOT NULL,
    quote_currency CHAR(3) NOT NULL,
    rate NUMERIC(20, 8) NOT NULL,
    updated_by UUID REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_exchange_rate_pair UNIQUE (base_currency, quote_currency),
    CONSTRAINT chk_exchange_rate_positive CHECK (rate > 0),
    CONSTRAINT chk_exchange_rate_distinct CHECK (base_currency <> quote_currency)
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: set_updated_at
-- Keeps updated_at current on every row update
-- ============================================================
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_users_updated_at BEFORE UPDATE ON users
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_transactions_updated_at BEFORE UPDATE ON transactions
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_plans_updated_at BEFORE UPDATE ON plans
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_user_plans_updated_at BEFORE UPDATE ON user_plans
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_coupons_updated_at BEFORE UPDATE ON coupons
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_coupon_redemptions_updated_at BEFORE UPDATE ON coupon_redemptions
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_referrals_updated_at BEFORE UPDATE ON referrals
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
CREATE TRIGGER trg_exchange_rates_updated_at BEFORE UPDATE ON exchange_rates
FOR EACH ROW EXECUTE FUNCTION set_updated_at();

-- ============================================================
-- FUNCTION: prevent_final_status_change
-- A transaction leaves 'pending' once and never changes status again
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_final_status_change()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'pending' AND NEW.status <> OLD.status THEN
        RAISE EXCEPTION 'Transaction % is %, status cannot change to %',
            OLD.id, OLD.status, NEW.status;
    END IF;

    IF NEW.amount <> OLD.amount OR NEW.user_id <> OLD.user_id THEN
        RAISE EXCEPTION 'Transaction amount and owner are immutable';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_final_status_change
BEFORE UPDATE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_final_status_change();

-- ============================================================
-- FUNCTION: prevent_transaction_delete
-- Transactions are an audit trail
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_transaction_delete()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Transactions cannot be deleted';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_transaction_delete
BEFORE DELETE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_transaction_delete();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS referrals CASCADE;
DROP TABLE IF EXISTS coupon_redemptions CASCADE;
DROP TABLE IF EXISTS coupons CASCADE;
DROP TABLE IF EXISTS user_plans CASCADE;
DROP TABLE IF EXISTS plans CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
DROP TABLE IF EXISTS users CASCADE;

DROP FUNCTION IF EXISTS prevent_transaction_delete();
DROP FUNCTION IF EXISTS prevent_final_status_change();
DROP FUNCTION IF EXISTS set_updated_at();
";
