use chrono::{Datelike, NaiveDate};

use crate::engine::{Engine, EngineError};
use crate::messages;
use crate::model::{Customer, CustomerId};
use crate::observability;
use crate::store::{CustomerPatch, SpendOutcome};

impl Engine {
    /// The first milestone strictly above `completed`, if any.
    pub fn next_milestone(&self, completed: u32) -> Option<u32> {
        self.config()
            .loyalty
            .milestones
            .iter()
            .copied()
            .find(|&m| m > completed)
    }

    /// Spend points from a customer's balance.
    pub async fn redeem_points(
        &self,
        customer_id: CustomerId,
        points: i64,
    ) -> Result<Customer, EngineError> {
        match self.store().spend_points(customer_id, points).await? {
            SpendOutcome::Spent(customer) => {
                metrics::counter!(observability::POINTS_REDEEMED).increment(points as u64);
                Ok(customer)
            }
            SpendOutcome::Insufficient { have } => Err(EngineError::InsufficientPoints {
                have,
                need: points,
            }),
            SpendOutcome::NotFound => {
                Err(EngineError::NotFound(format!("customer {customer_id}")))
            }
        }
    }

    /// Award points for a completed booking: the base rate, plus the bonus
    /// when this was the customer's first completion. Awarding is silent —
    /// no notification, the points simply appear on the balance.
    pub(crate) async fn award_booking_points(
        &self,
        customer_id: CustomerId,
        is_first: bool,
    ) -> Result<i64, EngineError> {
        let loyalty = &self.config().loyalty;
        let points = loyalty.points_per_booking
            + if is_first {
                loyalty.first_booking_bonus
            } else {
                0
            };
        self.store()
            .update_customer(customer_id, CustomerPatch::AddPoints { points })
            .await?;
        metrics::counter!(observability::POINTS_AWARDED).increment(points as u64);
        Ok(points)
    }

    /// Notify a milestone reward when the completed count lands exactly on a
    /// configured milestone. Exact match only: a count that skipped past a
    /// milestone (manual corrections) never triggers it late.
    pub(crate) async fn maybe_award_milestone(
        &self,
        customer: &Customer,
    ) -> Result<(), EngineError> {
        if !self
            .config()
            .loyalty
            .milestones
            .contains(&customer.completed_bookings)
        {
            return Ok(());
        }
        metrics::counter!(observability::MILESTONES_HIT).increment(1);
        self.notify().send(
            customer.id,
            messages::milestone_reached(customer.completed_bookings),
        );
        Ok(())
    }

    /// Grant the birthday bonus at most once per calendar year, advancing
    /// the reward-year stamp. `None` when this year's reward was already
    /// given.
    pub(crate) async fn award_birthday_reward(
        &self,
        customer: &Customer,
        today: NaiveDate,
    ) -> Result<Option<Customer>, EngineError> {
        let year = today.year();
        if customer.last_birthday_reward_year.is_some_and(|y| y >= year) {
            return Ok(None);
        }
        let updated = self
            .store()
            .update_customer(
                customer.id,
                CustomerPatch::BirthdayReward {
                    points: self.config().loyalty.birthday_bonus_points,
                    year,
                },
            )
            .await?;
        metrics::counter!(observability::BIRTHDAY_REWARDS).increment(1);
        Ok(updated)
    }
}
