//! State machines for dispatches, shipments and alerts.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{FleetError, FleetResult};
use crate::models::{
    Alert, AlertStatus, DispatchStatus, DriverStatus, OrderStatus, Shipment, ShipmentStatus,
    TrackingEvent, VehicleStatus,
};

impl DispatchStatus {
    /// Statuses reachable in one step.
    pub fn allowed_transitions(&self) -> &'static [DispatchStatus] {
        use DispatchStatus::*;
        match self {
            Planning => &[Scheduled, Cancelled],
            Scheduled => &[Assigned, InTransit, Cancelled],
            Assigned => &[InTransit, Cancelled],
            InTransit => &[Completed, Delayed, Cancelled],
            Delayed => &[InTransit, Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: DispatchStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

/// Fail with `InvalidTransition` unless `from -> to` is in the dispatch table.
pub fn check_dispatch_transition(from: DispatchStatus, to: DispatchStatus) -> FleetResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(FleetError::transition("dispatch", from, to))
    }
}

/// Resource and shipment updates implied by a dispatch status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchCascade {
    None,
    Depart,
    Complete,
    Cancel,
}

impl DispatchCascade {
    pub fn for_status(status: DispatchStatus) -> Self {
        match status {
            DispatchStatus::InTransit => Self::Depart,
            DispatchStatus::Completed => Self::Complete,
            DispatchStatus::Cancelled => Self::Cancel,
            _ => Self::None,
        }
    }

    pub fn vehicle_status(&self) -> Option<VehicleStatus> {
        match self {
            Self::Depart => Some(VehicleStatus::InTransit),
            Self::Complete | Self::Cancel => Some(VehicleStatus::Available),
            Self::None => None,
        }
    }

    pub fn driver_status(&self) -> Option<DriverStatus> {
        match self {
            Self::Complete | Self::Cancel => Some(DriverStatus::Available),
            Self::Depart | Self::None => None,
        }
    }

    /// New status for an order currently in `current`, if it changes.
    pub fn order_status(&self, current: OrderStatus) -> Option<OrderStatus> {
        use OrderStatus::*;
        match (self, current) {
            (Self::Depart, Assigned) => Some(InTransit),
            (Self::Complete, Assigned | InTransit) => Some(Delivered),
            (Self::Cancel, Assigned | InTransit) => Some(Confirmed),
            _ => None,
        }
    }

    /// Update a shipment of the dispatch. Returns true when it changed.
    pub fn apply_to_shipment(&self, shipment: &mut Shipment, at: DateTime<Utc>) -> bool {
        use ShipmentStatus::*;
        match (self, shipment.status) {
            (Self::Depart, Pending | Scheduled) => {
                shipment.status = InTransit;
                shipment.actual_departure = Some(at);
            }
            (Self::Complete, status) if !status.is_terminal() => {
                shipment.status = Completed;
                shipment.progress = 100.0;
                shipment.actual_arrival.get_or_insert(at);
            }
            (Self::Cancel, status) if !status.is_terminal() => {
                shipment.status = Cancelled;
            }
            _ => return false,
        }
        shipment.updated_at = at;
        true
    }
}

/// What an event did to a shipment.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    Transitioned {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },
    Rescheduled {
        estimated_arrival: DateTime<Utc>,
    },
    Annotated,
    /// Caller raises a CRITICAL alert
    Emergency,
    /// Caller runs the checkpoint monitor with the event location
    CheckpointCheck,
    /// Stale or duplicate event for the current status
    Ignored,
}

/// Largest extension a single DELAY event may apply.
pub const MAX_DELAY_HOURS: f64 = 24.0 * 366.0;

/// Offset a DELAY event pushes the estimated arrival by.
///
/// An absent `hours` falls back to `default_hours`. The resolved value must
/// be positive and finite, capped at [`MAX_DELAY_HOURS`].
pub fn delay_offset(hours: Option<f64>, default_hours: f64) -> FleetResult<TimeDelta> {
    let hours = hours.unwrap_or(default_hours);
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_DELAY_HOURS {
        return Err(FleetError::validation(
            "hours",
            format!("must be within (0, {MAX_DELAY_HOURS}]"),
        ));
    }
    TimeDelta::try_seconds((hours * 3600.0).round() as i64)
        .ok_or_else(|| FleetError::validation("hours", "delay out of range"))
}

/// Estimated arrival after a DELAY of `offset`, when representable.
pub fn delayed_arrival(estimated: DateTime<Utc>, offset: TimeDelta) -> FleetResult<DateTime<Utc>> {
    estimated
        .checked_add_signed(offset)
        .ok_or_else(|| FleetError::validation("hours", "estimated arrival out of range"))
}

/// Apply a lifecycle event to `shipment` in place.
///
/// Guards on the current status; an event that does not apply to the
/// current status leaves the shipment untouched and returns `Ignored`.
pub fn apply_event(
    shipment: &mut Shipment,
    event: &TrackingEvent,
    at: DateTime<Utc>,
    default_delay_hours: f64,
) -> EventEffect {
    use ShipmentStatus::*;

    let from = shipment.status;
    let effect = match (event, from) {
        (TrackingEvent::Departure, Pending | Scheduled) => {
            shipment.actual_departure = Some(at);
            move_to(shipment, InTransit)
        }
        (TrackingEvent::LoadingStart, Pending | Scheduled) => move_to(shipment, Loading),
        (TrackingEvent::LoadingComplete, Loading) => {
            shipment.actual_departure = Some(at);
            move_to(shipment, InTransit)
        }
        (TrackingEvent::Arrival, InTransit) => {
            shipment.actual_arrival = Some(at);
            shipment.progress = 100.0;
            move_to(shipment, Unloading)
        }
        (TrackingEvent::UnloadingStart, InTransit) => move_to(shipment, Unloading),
        (TrackingEvent::UnloadingComplete, Unloading) => {
            shipment.actual_arrival = Some(at);
            shipment.progress = 100.0;
            move_to(shipment, Delivered)
        }
        (TrackingEvent::Delay { hours }, _) => match shipment.estimated_arrival {
            Some(estimated) => match delay_offset(*hours, default_delay_hours)
                .and_then(|offset| delayed_arrival(estimated, offset))
            {
                Ok(pushed) => {
                    shipment.estimated_arrival = Some(pushed);
                    EventEffect::Rescheduled {
                        estimated_arrival: pushed,
                    }
                }
                // callers validate first; an unusable offset leaves the estimate alone
                Err(_) => EventEffect::Ignored,
            },
            None => EventEffect::Ignored,
        },
        (TrackingEvent::RouteChange { description }, _) => {
            shipment.notes = Some(format!("Route changed: {description}"));
            EventEffect::Annotated
        }
        (TrackingEvent::Emergency { .. }, _) => EventEffect::Emergency,
        (TrackingEvent::CheckpointPass, _) => EventEffect::CheckpointCheck,
        _ => EventEffect::Ignored,
    };

    if effect != EventEffect::Ignored {
        shipment.updated_at = at;
    }
    effect
}

fn move_to(shipment: &mut Shipment, to: ShipmentStatus) -> EventEffect {
    let from = shipment.status;
    shipment.status = to;
    EventEffect::Transitioned { from, to }
}

impl AlertStatus {
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, next),
            (Active, Acknowledged)
                | (Active | Acknowledged, Resolved)
                | (Active | Acknowledged, Dismissed)
        )
    }
}

fn check_alert_transition(alert: &Alert, to: AlertStatus) -> FleetResult<()> {
    if alert.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(FleetError::transition("alert", alert.status, to))
    }
}

/// ACTIVE -> ACKNOWLEDGED.
pub fn acknowledge_alert(alert: &mut Alert, by: Option<String>, at: DateTime<Utc>) -> FleetResult<()> {
    check_alert_transition(alert, AlertStatus::Acknowledged)?;
    alert.status = AlertStatus::Acknowledged;
    alert.acknowledged_by = by;
    alert.acknowledged_at = Some(at);
    Ok(())
}

/// ACTIVE/ACKNOWLEDGED -> RESOLVED.
pub fn resolve_alert(
    alert: &mut Alert,
    resolution: Option<String>,
    at: DateTime<Utc>,
) -> FleetResult<()> {
    check_alert_transition(alert, AlertStatus::Resolved)?;
    alert.status = AlertStatus::Resolved;
    alert.resolved_at = Some(at);
    alert.resolution = resolution;
    Ok(())
}

/// ACTIVE/ACKNOWLEDGED -> DISMISSED.
pub fn dismiss_alert(alert: &mut Alert, notes: Option<String>, at: DateTime<Utc>) -> FleetResult<()> {
    check_alert_transition(alert, AlertStatus::Dismissed)?;
    alert.status = AlertStatus::Dismissed;
    alert.resolved_at = Some(at);
    alert.resolution = notes;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertDraft, AlertSeverity, AlertType};
    use chrono::Duration;
    use crate::test_support::sample_shipment;

    fn alert() -> Alert {
        Alert::from_draft(
            AlertDraft {
                shipment_id: "s1".into(),
                alert_type: AlertType::Speeding,
                severity: AlertSeverity::High,
                title: "Speeding detected".into(),
                description: "fast".into(),
                location: None,
                tracking_point_id: None,
                anomaly: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn scheduled_cannot_jump_to_completed() {
        let err = check_dispatch_transition(DispatchStatus::Scheduled, DispatchStatus::Completed)
            .unwrap_err();
        assert_eq!(
            err,
            FleetError::InvalidTransition {
                entity: "dispatch",
                from: "SCHEDULED".into(),
                to: "COMPLETED".into(),
            }
        );
    }

    #[test]
    fn dispatch_table_allows_documented_moves() {
        use DispatchStatus::*;
        assert!(Planning.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Assigned));
        assert!(Scheduled.can_transition_to(InTransit));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(InTransit.can_transition_to(Delayed));
        assert!(Delayed.can_transition_to(InTransit));
        assert!(Delayed.can_transition_to(Completed));
        assert!(!Delayed.can_transition_to(Scheduled));
        assert!(Completed.allowed_transitions().is_empty());
        assert!(Cancelled.allowed_transitions().is_empty());
    }

    #[test]
    fn cancel_cascade_releases_and_skips_terminal_shipments() {
        let cascade = DispatchCascade::for_status(DispatchStatus::Cancelled);
        assert_eq!(cascade.vehicle_status(), Some(VehicleStatus::Available));
        assert_eq!(cascade.driver_status(), Some(DriverStatus::Available));
        assert_eq!(
            cascade.order_status(OrderStatus::Assigned),
            Some(OrderStatus::Confirmed)
        );
        assert_eq!(cascade.order_status(OrderStatus::Delivered), None);

        let mut open = sample_shipment("s1");
        open.status = ShipmentStatus::Scheduled;
        assert!(cascade.apply_to_shipment(&mut open, Utc::now()));
        assert_eq!(open.status, ShipmentStatus::Cancelled);

        let mut done = sample_shipment("s2");
        done.status = ShipmentStatus::Completed;
        assert!(!cascade.apply_to_shipment(&mut done, Utc::now()));
    }

    #[test]
    fn depart_cascade_moves_scheduled_shipments() {
        let cascade = DispatchCascade::for_status(DispatchStatus::InTransit);
        assert_eq!(cascade.vehicle_status(), Some(VehicleStatus::InTransit));
        assert_eq!(cascade.driver_status(), None);

        let mut shipment = sample_shipment("s1");
        shipment.status = ShipmentStatus::Scheduled;
        let at = Utc::now();
        assert!(cascade.apply_to_shipment(&mut shipment, at));
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        assert_eq!(shipment.actual_departure, Some(at));

        shipment.status = ShipmentStatus::Loading;
        assert!(!cascade.apply_to_shipment(&mut shipment, at));
        assert_eq!(DispatchCascade::for_status(DispatchStatus::Delayed), DispatchCascade::None);
    }

    #[test]
    fn arrival_moves_in_transit_to_unloading() {
        let mut shipment = sample_shipment("s1");
        shipment.status = ShipmentStatus::InTransit;
        shipment.progress = 73.0;
        let at = Utc::now();

        let effect = apply_event(&mut shipment, &TrackingEvent::Arrival, at, 24.0);
        assert_eq!(
            effect,
            EventEffect::Transitioned {
                from: ShipmentStatus::InTransit,
                to: ShipmentStatus::Unloading
            }
        );
        assert_eq!(shipment.status, ShipmentStatus::Unloading);
        assert_eq!(shipment.progress, 100.0);
        assert_eq!(shipment.actual_arrival, Some(at));
    }

    #[test]
    fn duplicate_departure_is_ignored() {
        let mut shipment = sample_shipment("s1");
        shipment.status = ShipmentStatus::Scheduled;
        let first = Utc::now();
        apply_event(&mut shipment, &TrackingEvent::Departure, first, 24.0);
        assert_eq!(shipment.status, ShipmentStatus::InTransit);

        let later = first + Duration::minutes(5);
        let effect = apply_event(&mut shipment, &TrackingEvent::Departure, later, 24.0);
        assert_eq!(effect, EventEffect::Ignored);
        assert_eq!(shipment.actual_departure, Some(first));
    }

    #[test]
    fn loading_flow_reaches_delivered() {
        let mut shipment = sample_shipment("s1");
        shipment.status = ShipmentStatus::Pending;
        let at = Utc::now();
        for event in [
            TrackingEvent::LoadingStart,
            TrackingEvent::LoadingComplete,
            TrackingEvent::UnloadingStart,
            TrackingEvent::UnloadingComplete,
        ] {
            apply_event(&mut shipment, &event, at, 24.0);
        }
        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert_eq!(shipment.progress, 100.0);
        assert!(shipment.actual_departure.is_some());
    }

    #[test]
    fn delay_extends_existing_estimate_only() {
        let mut shipment = sample_shipment("s1");
        shipment.estimated_arrival = None;
        assert_eq!(
            apply_event(&mut shipment, &TrackingEvent::Delay { hours: None }, Utc::now(), 24.0),
            EventEffect::Ignored
        );

        let eta = Utc::now();
        shipment.estimated_arrival = Some(eta);
        apply_event(&mut shipment, &TrackingEvent::Delay { hours: None }, Utc::now(), 24.0);
        assert_eq!(shipment.estimated_arrival, Some(eta + Duration::hours(24)));

        apply_event(
            &mut shipment,
            &TrackingEvent::Delay { hours: Some(2.0) },
            Utc::now(),
            24.0,
        );
        assert_eq!(shipment.estimated_arrival, Some(eta + Duration::hours(26)));
    }

    #[test]
    fn oversized_delay_is_rejected_without_moving_estimate() {
        for hours in [1e12, f64::INFINITY, f64::NAN, -3.0, 0.0, MAX_DELAY_HOURS + 1.0] {
            let err = delay_offset(Some(hours), 24.0).unwrap_err();
            assert_eq!(err.field(), Some("hours"));
        }
        assert_eq!(delay_offset(Some(MAX_DELAY_HOURS), 24.0).unwrap(), Duration::hours(24 * 366));

        let mut shipment = sample_shipment("s1");
        let eta = Utc::now();
        shipment.estimated_arrival = Some(eta);
        let effect = apply_event(
            &mut shipment,
            &TrackingEvent::Delay { hours: Some(1e12) },
            Utc::now(),
            24.0,
        );
        assert_eq!(effect, EventEffect::Ignored);
        assert_eq!(shipment.estimated_arrival, Some(eta));

        assert!(delayed_arrival(DateTime::<Utc>::MAX_UTC, Duration::hours(1)).is_err());
    }

    #[test]
    fn route_change_only_annotates() {
        let mut shipment = sample_shipment("s1");
        let status = shipment.status;
        let effect = apply_event(
            &mut shipment,
            &TrackingEvent::RouteChange {
                description: "detour via I-80".into(),
            },
            Utc::now(),
            24.0,
        );
        assert_eq!(effect, EventEffect::Annotated);
        assert_eq!(shipment.status, status);
        assert_eq!(shipment.notes.as_deref(), Some("Route changed: detour via I-80"));
    }

    #[test]
    fn alert_operator_transitions() {
        let now = Utc::now();
        let mut a = alert();
        acknowledge_alert(&mut a, Some("ops".into()), now).unwrap();
        assert_eq!(a.status, AlertStatus::Acknowledged);
        assert_eq!(a.acknowledged_by.as_deref(), Some("ops"));

        let err = acknowledge_alert(&mut a, None, now).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");

        resolve_alert(&mut a, Some("driver slowed down".into()), now).unwrap();
        assert_eq!(a.status, AlertStatus::Resolved);
        assert!(dismiss_alert(&mut a, None, now).is_err());

        let mut b = alert();
        dismiss_alert(&mut b, Some("false positive".into()), now).unwrap();
        assert_eq!(b.status, AlertStatus::Dismissed);
        assert!(resolve_alert(&mut b, None, now).is_err());
    }
}
