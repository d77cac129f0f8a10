//! Write-behind of store changes and startup reload.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::{Sqlite, SqlitePool, Transaction};

use fleet_core::{Change, Snapshot};

/// Upsert one change within an open transaction.
pub async fn upsert_change_tx(tx: &mut Transaction<'_, Sqlite>, change: &Change) -> Result<()> {
    let (table, id) = change.key();
    let payload = payload(change).with_context(|| format!("encode {table} record {id}"))?;

    // table names come from `Change::key`, never from input
    let statement = format!(
        "INSERT INTO {table} (id, payload, updated_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at"
    );
    sqlx::query(&statement)
        .bind(&id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Write a set of changes in a single transaction.
pub async fn write_changes(pool: &SqlitePool, changes: &[Change]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for change in changes {
        if let Err(err) = upsert_change_tx(&mut tx, change).await {
            tx.rollback().await.ok();
            return Err(err);
        }
    }
    tx.commit().await?;
    Ok(())
}

/// Everything persisted so far, points in receipt order.
pub async fn load_snapshot(pool: &SqlitePool) -> Result<Snapshot> {
    let mut snapshot = Snapshot {
        orders: load_table(pool, "orders").await?,
        vehicles: load_table(pool, "vehicles").await?,
        drivers: load_table(pool, "drivers").await?,
        dispatches: load_table(pool, "dispatches").await?,
        shipments: load_table(pool, "shipments").await?,
        routes: load_table(pool, "tracking_routes").await?,
        points: load_table(pool, "tracking_points").await?,
        events: load_table(pool, "shipment_events").await?,
        alerts: load_table(pool, "alerts").await?,
    };
    // rows within one flush are written in arbitrary order
    snapshot.points.sort_by(|a, b| {
        a.received_at
            .cmp(&b.received_at)
            .then(a.timestamp.cmp(&b.timestamp))
    });
    tracing::info!(
        dispatches = snapshot.dispatches.len(),
        shipments = snapshot.shipments.len(),
        points = snapshot.points.len(),
        alerts = snapshot.alerts.len(),
        "Loaded persisted fleet state"
    );
    Ok(snapshot)
}

async fn load_table<T: DeserializeOwned>(pool: &SqlitePool, table: &str) -> Result<Vec<T>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as(&format!("SELECT id, payload FROM {table} ORDER BY rowid"))
            .fetch_all(pool)
            .await?;
    rows.into_iter()
        .map(|(id, payload)| {
            serde_json::from_str(&payload).with_context(|| format!("decode {table} record {id}"))
        })
        .collect()
}

fn payload(change: &Change) -> serde_json::Result<String> {
    match change {
        Change::Order(order) => serde_json::to_string(order),
        Change::Vehicle(vehicle) => serde_json::to_string(vehicle),
        Change::Driver(driver) => serde_json::to_string(driver),
        Change::Dispatch(dispatch) => serde_json::to_string(dispatch),
        Change::Shipment(shipment) => serde_json::to_string(shipment),
        Change::Route(route) => serde_json::to_string(route),
        Change::Point(point) => serde_json::to_string(point),
        Change::Event(event) => serde_json::to_string(event),
        Change::Alert(alert) => serde_json::to_string(alert),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use fleet_core::models::{
        Coordinate, Order, OrderStatus, Priority, ShipmentEvent, EventKind,
    };

    fn order(status: OrderStatus) -> Order {
        Order {
            id: "o1".to_string(),
            order_number: "ORD-1".to_string(),
            customer_id: None,
            origin_address: "A".to_string(),
            destination_address: "B".to_string(),
            origin: Coordinate::new(40.0, -74.0),
            destination: Coordinate::new(40.5, -74.0),
            cargo_weight: 10.0,
            cargo_volume: 1.0,
            cargo_value: 100.0,
            priority: Priority::High,
            status,
        }
    }

    #[tokio::test]
    async fn later_change_replaces_earlier() {
        let db = init_database(":memory:", 1).await.unwrap();
        let event = ShipmentEvent {
            id: "e1".to_string(),
            shipment_id: "s1".to_string(),
            kind: EventKind::Arrival,
            description: Some("at dock".to_string()),
            timestamp: Utc::now(),
            tracking_point_id: None,
        };

        write_changes(
            db.pool(),
            &[
                Change::Order(order(OrderStatus::Confirmed)),
                Change::Event(event),
            ],
        )
        .await
        .unwrap();
        write_changes(db.pool(), &[Change::Order(order(OrderStatus::Assigned))])
            .await
            .unwrap();

        let snapshot = load_snapshot(db.pool()).await.unwrap();
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.orders[0].status, OrderStatus::Assigned);
        assert_eq!(snapshot.events[0].description.as_deref(), Some("at dock"));
        assert!(snapshot.dispatches.is_empty());
    }
}
