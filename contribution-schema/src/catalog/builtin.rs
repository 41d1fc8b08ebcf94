//! Built-in schemas for the sample contribution types.
//!
//! Field names keep each service's own casing (`userid`, `userId`,
//! `username`); they are not unified across types.

use super::tags;
use crate::descriptor::{FieldKind, ListSpec, ObjectRule, ObjectSchema, SchemaDescriptor, Uniqueness};

/// Closed set of Zomato delivery states.
pub const DELIVERY_STATUSES: &[&str] = &[
    "Delivered",
    "Pending",
    "Cancelled",
    "Preparing",
    "OutForDelivery",
    "Failed",
];

/// Ride history: a list of trip objects.
pub fn uber() -> SchemaDescriptor {
    let trip = ObjectSchema::new()
        .required("beginTripTime", FieldKind::Timestamp)
        .required("dropoffTime", FieldKind::Timestamp)
        .required("pickupAddress", FieldKind::text())
        .required("dropoffAddress", FieldKind::text())
        .required("fare", FieldKind::Amount)
        .required("vehicleType", FieldKind::text())
        .rule(ObjectRule::chronological("beginTripTime", "dropoffTime"));

    SchemaDescriptor::new(
        tags::UBER,
        ObjectSchema::new()
            .required("trips", FieldKind::list_of(FieldKind::object(trip)))
            .required("userid", FieldKind::text())
            .required("username", FieldKind::text()),
    )
}

/// Game library: a list of titles, repeats tolerated.
pub fn steam() -> SchemaDescriptor {
    SchemaDescriptor::new(
        tags::STEAM,
        ObjectSchema::new()
            .required(
                "ownedGames",
                FieldKind::list(ListSpec {
                    element: FieldKind::text(),
                    uniqueness: Uniqueness::WarnOnDuplicates,
                }),
            )
            .required("userId", FieldKind::text()),
    )
}

/// Watch history: titles grouped under calendar dates.
pub fn amazon_prime() -> SchemaDescriptor {
    SchemaDescriptor::new(
        tags::AMAZON_PRIME,
        ObjectSchema::new()
            .required("profileName", FieldKind::text())
            .optional("userId", FieldKind::text())
            .required(
                "watchHistory",
                FieldKind::date_map(FieldKind::list_of(FieldKind::text())),
            ),
    )
}

/// Food orders: a list of orders with nested delivery details.
pub fn zomato() -> SchemaDescriptor {
    let delivery = ObjectSchema::new()
        .required("deliveryAddress", FieldKind::text())
        .required("deliveryStatus", FieldKind::one_of(DELIVERY_STATUSES))
        .optional("deliveryMessage", FieldKind::any_text())
        .optional("deliveryLabel", FieldKind::any_text());

    let order = ObjectSchema::new()
        .required("orderId", FieldKind::text())
        .required("totalCost", FieldKind::Amount)
        .required("dishString", FieldKind::text())
        .required("deliveryDetails", FieldKind::object(delivery))
        .required("restaurantURL", FieldKind::Uri);

    SchemaDescriptor::new(
        tags::ZOMATO,
        ObjectSchema::new()
            .required("userid", FieldKind::text())
            .required(
                "orders",
                FieldKind::list(ListSpec {
                    element: FieldKind::object(order),
                    uniqueness: Uniqueness::UniqueField("orderId".to_string()),
                }),
            ),
    )
}
