//! Self-trade prevention policy.
//!
//! A mode enum plus a pure scan-and-decide function over resting orders at
//! one price level. Same-user crosses are skipped by default rather than
//! executed, so `StpPolicy::Skip` is `#[default]`; `None` remains available
//! as an explicit opt-out for venues that want same-user crosses to fill.

use crate::orderbook::order::Order;
use serde::{Deserialize, Serialize};

/// Self-trade prevention mode, configured per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StpPolicy {
    /// Treat a same-user maker as transparent: skip it for this cross
    /// (matching continues past it against the next eligible maker) and
    /// leave it resting untouched. The engine's default.
    #[default]
    Skip,
    /// Cancel the incoming (taker) order as soon as a same-user maker is
    /// encountered. Fills against different users preceding it stand.
    CancelTaker,
    /// Cancel every same-user resting order at the level before matching
    /// proceeds, then continue the cross against the remaining makers.
    CancelMaker,
    /// Cancel both the taker and the first same-user maker encountered;
    /// matching stops immediately. Fills preceding it stand.
    CancelBoth,
    /// No self-trade prevention; same-user orders may match freely.
    None,
}

/// The action the matcher should take upon encountering a self-trade at a
/// price level, per the configured [`StpPolicy`].
#[derive(Debug, Clone)]
pub enum StpAction {
    /// No self-trade at this level (or the taker is exempt); proceed
    /// normally.
    NoConflict,
    /// `Skip` policy: every same-user maker at this level should be passed
    /// over for the current cross without being cancelled or otherwise
    /// touched — checked per-maker in the cross loop, since a level can
    /// hold more than one same-user resting order.
    Skip,
    /// `CancelTaker` policy: stop matching; cancel the taker. Fills already
    /// recorded against prior, different-user makers stand.
    CancelTaker,
    /// `CancelMaker` policy: cancel every listed same-user resting order,
    /// then continue matching against what remains.
    CancelMaker {
        /// Order ids of same-user resting orders to cancel.
        maker_order_ids: Vec<String>,
    },
    /// `CancelBoth` policy: cancel the taker and the named maker; stop
    /// matching immediately.
    CancelBoth {
        /// The same-user maker order id to cancel alongside the taker.
        maker_order_id: String,
    },
}

/// Scan resting orders at one price level (FIFO order) for a self-trade
/// against `taker_user_id` and decide the action per `policy`.
pub fn check_stp_at_level(orders: &[Order], taker_user_id: &str, policy: StpPolicy) -> StpAction {
    match policy {
        StpPolicy::None => StpAction::NoConflict,

        StpPolicy::Skip => {
            if orders.iter().any(|o| o.user_id == taker_user_id) {
                StpAction::Skip
            } else {
                StpAction::NoConflict
            }
        }

        StpPolicy::CancelTaker => {
            for order in orders {
                if order.user_id == taker_user_id {
                    return StpAction::CancelTaker;
                }
            }
            StpAction::NoConflict
        }

        StpPolicy::CancelMaker => {
            let maker_order_ids: Vec<String> = orders
                .iter()
                .filter(|o| o.user_id == taker_user_id)
                .map(|o| o.order_id.clone())
                .collect();
            if maker_order_ids.is_empty() {
                StpAction::NoConflict
            } else {
                StpAction::CancelMaker { maker_order_ids }
            }
        }

        StpPolicy::CancelBoth => {
            for order in orders {
                if order.user_id == taker_user_id {
                    return StpAction::CancelBoth {
                        maker_order_id: order.order_id.clone(),
                    };
                }
            }
            StpAction::NoConflict
        }
    }
}
