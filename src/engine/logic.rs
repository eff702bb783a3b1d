use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::accrual::calculator::{max_plausible_interest, sanitize};
use crate::engine::state::EngineState;
use crate::engine::types::{BalanceUpdate, EngineCommand};

pub fn on_snapshot(
    state: &mut EngineState,
    update: BalanceUpdate,
    now: DateTime<Utc>,
) -> Vec<EngineCommand> {
    let balance = sanitize(update.balance);
    let remote_interest = sanitize(update.remote_interest);

    let mut cmds = vec![EngineCommand::PublishBalance {
        balance,
        updated_at: update.last_updated,
    }];

    // Withdrawal detection comes before the seed decision: a large drop
    // means funds left the wallet and the remote interest is suspect.
    if is_withdrawal_drop(state, balance) {
        log::info!(
            "[ENGINE] balance drop {} -> {} looks like a withdrawal",
            state.prev_balance.unwrap_or(0.0),
            balance
        );
        cmds.push(EngineCommand::RecordWithdrawal);
        state.last_withdrawal = Some(now);
    }

    state.prev_balance = Some(balance);

    if balance <= 0.0 {
        // Nothing accrues on an empty wallet; remote interest goes to zero
        // and the loop stays down.
        log::info!("[ENGINE] zero balance: resetting interest, no accrual");
        cmds.push(EngineCommand::StopAccrual);
        cmds.push(EngineCommand::SeedAccrual { interest: 0.0 });
        cmds.push(EngineCommand::ResetRemoteInterest);
        return cmds;
    }

    if remote_interest < state.config.interest_epsilon {
        cmds.push(EngineCommand::SeedAccrual { interest: 0.0 });
        cmds.push(EngineCommand::StartAccrual { principal: balance });
        return cmds;
    }

    if remote_interest_is_stale(state, balance, remote_interest, now) {
        log::info!(
            "[ENGINE] remote interest {} is stale, resetting to 0",
            remote_interest
        );
        cmds.push(EngineCommand::SeedAccrual { interest: 0.0 });
        cmds.push(EngineCommand::ResetRemoteInterest);
        cmds.push(EngineCommand::StartAccrual { principal: balance });
        return cmds;
    }

    cmds.push(EngineCommand::SeedAccrual {
        interest: remote_interest,
    });
    cmds.push(EngineCommand::StartAccrual { principal: balance });
    cmds
}

pub fn on_withdrawal_registered(
    state: &mut EngineState,
    at: DateTime<Utc>,
) -> Vec<EngineCommand> {
    state.last_withdrawal = Some(at);
    // Stop rather than restart: the principal the loop froze at start is now
    // stale, and the follow-up refresh restarts with the updated balance.
    vec![
        EngineCommand::StopAccrual,
        EngineCommand::SeedAccrual { interest: 0.0 },
        EngineCommand::ResetRemoteInterest,
    ]
}

fn is_withdrawal_drop(state: &EngineState, balance: f64) -> bool {
    let Some(prev) = state.prev_balance else {
        return false;
    };
    if prev <= 0.0 {
        return false;
    }
    let drop = prev - balance;
    drop > state.config.withdrawal_absolute_drop
        && drop / prev > state.config.withdrawal_relative_drop
}

fn remote_interest_is_stale(
    state: &EngineState,
    balance: f64,
    remote_interest: f64,
    now: DateTime<Utc>,
) -> bool {
    let Some(withdrawn_at) = state.last_withdrawal else {
        return false;
    };

    // A withdrawal inside the current session always invalidates whatever
    // the store still holds.
    if withdrawn_at >= state.session_started_at {
        return true;
    }

    let elapsed_ms = (now - withdrawn_at).num_milliseconds().max(0) as u64;
    let elapsed = Duration::from_millis(elapsed_ms);
    let max = max_plausible_interest(balance, state.config.annual_rate, elapsed);
    remote_interest > max
}
