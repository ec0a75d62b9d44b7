use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use voya_approval::{
    ApprovalError, ApprovalOptions, ApprovalService, PricingOverride, ReleaseOptions,
};
use voya_domain::{
    AllocationBreakdown, CabinClass, CapacityRow, Flight, FlightStatus, ProviderType,
    ProvisionDefaults, ReservationStatus, RequestDetail, RequestStatus, Room, RoomReservation,
    ServiceRequest,
};
use voya_store::MemoryStore;

fn future(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

fn pending_request(
    provider: ProviderType,
    item_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    quantity: i32,
) -> ServiceRequest {
    ServiceRequest {
        id: Uuid::new_v4(),
        provider_type: provider,
        item_id,
        status: RequestStatus::Pending,
        start_date: start,
        end_date: end,
        quantity,
        currency: "USD".to_string(),
        requested_by: "agent-7".to_string(),
        detail: RequestDetail::None,
        expires_at: Utc::now() + Duration::days(30),
        approved_by: None,
        approval_notes: None,
        approval_terms: None,
        decided_at: None,
        created_at: Utc::now(),
    }
}

fn ledger_row(provider: ProviderType, item_id: Uuid, date: NaiveDate, capacity: i32, price: f64) -> CapacityRow {
    CapacityRow::provisioned(
        provider,
        item_id,
        date,
        &ProvisionDefaults { capacity, price },
        "USD",
    )
}

fn scheduled_flight(id: Uuid, seats: i32) -> Flight {
    Flight {
        id,
        flight_number: "VY900".to_string(),
        status: FlightStatus::Scheduled,
        active: true,
        total_seats: seats,
        available_seats: seats,
        departure_at: Utc::now() + Duration::days(20),
        booking_deadline_at: Some(Utc::now() + Duration::days(19)),
        group_booking: false,
        min_group_size: None,
        max_group_size: None,
        economy_fare: Some(150.0),
        business_fare: Some(400.0),
        first_fare: None,
    }
}

#[tokio::test]
async fn hotel_approval_auto_provisions_missing_dates() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let start = future(10);
    let end = start + Duration::days(3);
    let request = pending_request(ProviderType::Hotel, item, start, end, 1);
    let request_id = request.id;
    store.put_request(request);

    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds");

    // three nights at the hotel default of 50 capacity / 100 price
    assert_eq!(allocation.allocated_price, 300.0);
    let AllocationBreakdown::PerDay { days } = &allocation.breakdown else {
        panic!("hotel allocation must carry a per-day breakdown");
    };
    assert_eq!(days.len(), 3);
    assert!(days.iter().all(|d| d.unit_price == 100.0 && d.quantity == 1));

    for offset in 0..3 {
        let row = store
            .ledger_snapshot(ProviderType::Hotel, item, start + Duration::days(offset))
            .expect("row auto-provisioned");
        assert_eq!(row.total_capacity, 50);
        assert_eq!(row.available_capacity, 49);
        assert_eq!(row.allocated_capacity, 1);
        assert!(row.invariant_holds());
    }
    // checkout day is never debited
    assert!(store.ledger_snapshot(ProviderType::Hotel, item, end).is_none());

    let request = store.request_snapshot(request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.approved_by.as_deref(), Some("system"));
}

#[tokio::test]
async fn same_day_transport_debits_one_date() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let day = future(5);
    let request = pending_request(ProviderType::Transport, item, day, day, 2);
    let request_id = request.id;
    store.put_request(request);

    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds");

    let AllocationBreakdown::PerDay { days } = &allocation.breakdown else {
        panic!("per-day breakdown expected");
    };
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, day);
    // transport defaults: 10 capacity / 50 price
    assert_eq!(allocation.allocated_price, 100.0);

    let row = store.ledger_snapshot(ProviderType::Transport, item, day).unwrap();
    assert_eq!(row.available_capacity, 8);
    assert!(store
        .ledger_snapshot(ProviderType::Transport, item, day + Duration::days(1))
        .is_none());
}

#[tokio::test]
async fn insufficient_capacity_names_every_short_date_and_leaves_no_trace() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let start = future(7);
    // day one has room, day two is nearly empty, day three does not exist yet
    store.put_ledger_row(ledger_row(ProviderType::Other, item, start, 5, 20.0));
    let mut tight = ledger_row(ProviderType::Other, item, start + Duration::days(1), 5, 20.0);
    tight.allocated_capacity = 4;
    tight.available_capacity = 1;
    store.put_ledger_row(tight);

    let request = pending_request(ProviderType::Other, item, start, start + Duration::days(2), 3);
    let request_id = request.id;
    store.put_request(request);

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    match err {
        ApprovalError::InsufficientCapacity { requested, dates } => {
            assert_eq!(requested, 3);
            assert_eq!(dates, vec![start + Duration::days(1)]);
        }
        other => panic!("expected capacity conflict, got {other:?}"),
    }

    // rollback removed the auto-provisioned third day and left the rest alone
    let row = store.ledger_snapshot(ProviderType::Other, item, start).unwrap();
    assert_eq!(row.allocated_capacity, 0);
    assert!(store
        .ledger_snapshot(ProviderType::Other, item, start + Duration::days(2))
        .is_none());
    let request = store.request_snapshot(request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_never_oversell_the_ledger() {
    let store = MemoryStore::new();
    let service = Arc::new(ApprovalService::with_defaults(store.clone()));

    let item = Uuid::new_v4();
    let day = future(14);
    store.put_ledger_row(ledger_row(ProviderType::Other, item, day, 10, 25.0));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let request = pending_request(ProviderType::Other, item, day, day, 2);
        let request_id = request.id;
        store.put_request(request);
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .approve_request(request_id, &ApprovalOptions::default())
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.expect("task completes") {
            successes += 1;
        }
    }

    // 10 units / 2 per request: exactly 5 of the 6 can win
    assert_eq!(successes, 5);
    let row = store.ledger_snapshot(ProviderType::Other, item, day).unwrap();
    assert_eq!(row.available_capacity, 0);
    assert_eq!(row.allocated_capacity, 10);
    assert!(row.invariant_holds());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flight_seat_race_has_exactly_one_winner() {
    let store = MemoryStore::new();
    let service = Arc::new(ApprovalService::with_defaults(store.clone()));

    let flight_id = Uuid::new_v4();
    store.put_flight(scheduled_flight(flight_id, 8));

    let day = future(20);
    let mut handles = Vec::new();
    for _ in 0..2 {
        let mut request = pending_request(ProviderType::Flight, flight_id, day, day, 5);
        request.detail = RequestDetail::Flight {
            cabin_class: Some(CabinClass::Economy),
        };
        let request_id = request.id;
        store.put_request(request);
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .approve_request(request_id, &ApprovalOptions::default())
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.expect("task completes") {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    let flight = store.flight_snapshot(flight_id).unwrap();
    assert_eq!(flight.available_seats, 3);
    assert!(flight.available_seats >= 0);
}

#[tokio::test]
async fn release_restores_capacity_and_is_idempotent() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let start = future(9);
    let end = start + Duration::days(2);
    store.put_ledger_row(ledger_row(ProviderType::Hotel, item, start, 30, 80.0));
    store.put_ledger_row(ledger_row(ProviderType::Hotel, item, start + Duration::days(1), 30, 80.0));

    let request = pending_request(ProviderType::Hotel, item, start, end, 4);
    let request_id = request.id;
    store.put_request(request);

    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds");
    assert_eq!(
        store.ledger_snapshot(ProviderType::Hotel, item, start).unwrap().available_capacity,
        26
    );

    service
        .release_allocation(allocation.id, &ReleaseOptions { reason: Some("cancelled".to_string()) })
        .await
        .expect("first release succeeds");

    for offset in 0..2 {
        let row = store
            .ledger_snapshot(ProviderType::Hotel, item, start + Duration::days(offset))
            .unwrap();
        assert_eq!(row.available_capacity, 30);
        assert_eq!(row.allocated_capacity, 0);
        assert!(row.invariant_holds());
    }

    let err = service
        .release_allocation(allocation.id, &ReleaseOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALLOCATION_NOT_ACTIVE");

    // the second attempt credited nothing
    assert_eq!(
        store.ledger_snapshot(ProviderType::Hotel, item, start).unwrap().available_capacity,
        30
    );
    let released = store.allocation_snapshot(allocation.id).unwrap();
    assert_eq!(released.released_by.as_deref(), Some("system"));
    assert_eq!(released.release_reason.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn seat_release_credits_back_without_exceeding_total() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let flight_id = Uuid::new_v4();
    store.put_flight(scheduled_flight(flight_id, 12));

    let day = future(15);
    let mut request = pending_request(ProviderType::Flight, flight_id, day, day, 3);
    request.detail = RequestDetail::Flight {
        cabin_class: Some(CabinClass::Business),
    };
    let request_id = request.id;
    store.put_request(request);

    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds");
    assert_eq!(allocation.allocated_price, 1200.0);
    assert_eq!(store.flight_snapshot(flight_id).unwrap().available_seats, 9);

    service
        .release_allocation(allocation.id, &ReleaseOptions::default())
        .await
        .expect("release succeeds");
    assert_eq!(store.flight_snapshot(flight_id).unwrap().available_seats, 12);

    let err = service
        .release_allocation(allocation.id, &ReleaseOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALLOCATION_NOT_ACTIVE");
    assert_eq!(store.flight_snapshot(flight_id).unwrap().available_seats, 12);
}

#[tokio::test]
async fn room_gate_blocks_when_overlap_leaves_too_few_rooms() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let hotel = Uuid::new_v4();
    let room_a = Uuid::new_v4();
    let room_b = Uuid::new_v4();
    for (id, number) in [(room_a, "101"), (room_b, "102")] {
        store.put_room(Room {
            id,
            hotel_item_id: hotel,
            room_number: number.to_string(),
            active: true,
            available: true,
            max_occupancy: 2,
        });
    }

    let start = future(12);
    let end = start + Duration::days(3);
    // room A is taken for a stay straddling the requested window
    store.put_reservation(RoomReservation {
        id: Uuid::new_v4(),
        room_id: room_a,
        check_in: start + Duration::days(1),
        check_out: end + Duration::days(2),
        status: ReservationStatus::Confirmed,
    });

    let mut request = pending_request(ProviderType::Hotel, hotel, start, end, 2);
    request.detail = RequestDetail::Rooms { rooms_requested: 2, occupancy: 2 };
    let request_id = request.id;
    store.put_request(request);

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    match err {
        ApprovalError::InsufficientRooms { requested, available } => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected room conflict, got {other:?}"),
    }

    // a single-room request for the same window goes through the ledger
    let mut request = pending_request(ProviderType::Hotel, hotel, start, end, 1);
    request.detail = RequestDetail::Rooms { rooms_requested: 1, occupancy: 2 };
    let request_id = request.id;
    store.put_request(request);
    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("one room is still free");
    assert_eq!(allocation.allocated_price, 300.0);
}

#[tokio::test]
async fn room_detail_disagreeing_with_quantity_is_rejected() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let hotel = Uuid::new_v4();
    store.put_room(Room {
        id: Uuid::new_v4(),
        hotel_item_id: hotel,
        room_number: "201".to_string(),
        active: true,
        available: true,
        max_occupancy: 2,
    });

    let start = future(8);
    let mut request = pending_request(ProviderType::Hotel, hotel, start, start + Duration::days(2), 1);
    request.detail = RequestDetail::Rooms { rooms_requested: 2, occupancy: 2 };
    let request_id = request.id;
    store.put_request(request);

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    // nothing was provisioned or debited
    assert!(store.ledger_snapshot(ProviderType::Hotel, hotel, start).is_none());
    let request = store.request_snapshot(request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
}

#[tokio::test]
async fn hotel_without_rooms_is_not_found() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let hotel = Uuid::new_v4();
    let start = future(6);
    let mut request = pending_request(ProviderType::Hotel, hotel, start, start + Duration::days(1), 1);
    request.detail = RequestDetail::Rooms { rooms_requested: 1, occupancy: 2 };
    let request_id = request.id;
    store.put_request(request);

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "HOTEL_NOT_FOUND");
}

#[tokio::test]
async fn expired_and_unknown_requests_fail_cleanly() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let err = service
        .approve_request(Uuid::new_v4(), &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REQUEST_NOT_FOUND");

    let item = Uuid::new_v4();
    let start = future(3);
    let mut request = pending_request(ProviderType::Other, item, start, start, 1);
    request.expires_at = Utc::now() - Duration::minutes(5);
    let request_id = request.id;
    store.put_request(request);

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");
    // nothing was written
    assert!(store.ledger_snapshot(ProviderType::Other, item, start).is_none());
}

#[tokio::test]
async fn batch_approval_isolates_failures() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let day = future(8);
    store.put_ledger_row(ledger_row(ProviderType::Transport, item, day, 3, 40.0));

    let good = pending_request(ProviderType::Transport, item, day, day, 2);
    let good_id = good.id;
    store.put_request(good);

    let starved = pending_request(ProviderType::Transport, item, day, day, 5);
    let starved_id = starved.id;
    store.put_request(starved);

    let missing_id = Uuid::new_v4();

    let outcome = service
        .batch_approve(&[good_id, missing_id, starved_id], &ApprovalOptions::default())
        .await;

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.failure_count, 2);

    let by_id: std::collections::HashMap<_, _> = outcome
        .results
        .iter()
        .map(|r| (r.request_id, r))
        .collect();
    assert!(by_id[&good_id].success);
    assert_eq!(by_id[&missing_id].error_code.as_deref(), Some("REQUEST_NOT_FOUND"));
    assert_eq!(by_id[&starved_id].error_code.as_deref(), Some("INSUFFICIENT_CAPACITY"));

    // the good approval landed despite its neighbours
    let row = store.ledger_snapshot(ProviderType::Transport, item, day).unwrap();
    assert_eq!(row.available_capacity, 1);
}

#[tokio::test]
async fn pricing_override_beats_ledger_base_price() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let start = future(11);
    let end = start + Duration::days(2);
    let request = pending_request(ProviderType::Hotel, item, start, end, 2);
    let request_id = request.id;
    store.put_request(request);

    let options = ApprovalOptions {
        notes: Some("negotiated rate".to_string()),
        terms: None,
        pricing: Some(PricingOverride {
            unit_price: Some(75.0),
            commission_rate: Some(0.2),
        }),
    };
    let allocation = service
        .approve_request(request_id, &options)
        .await
        .expect("approval succeeds");

    // 2 nights x 2 units x 75
    assert_eq!(allocation.allocated_price, 300.0);
    assert_eq!(allocation.commission, 60.0);
    let request = store.request_snapshot(request_id).unwrap();
    assert_eq!(request.approval_notes.as_deref(), Some("negotiated rate"));
}

#[tokio::test]
async fn price_lookup_is_consulted_when_no_override_given() {
    use async_trait::async_trait;
    use voya_approval::{PriceLookup, SystemIdentity};
    use voya_store::ApprovalRules;

    struct FlatRate(f64);

    #[async_trait]
    impl PriceLookup for FlatRate {
        async fn unit_price(
            &self,
            _provider_type: ProviderType,
            _item_id: Uuid,
            _date: NaiveDate,
        ) -> Result<Option<f64>, ApprovalError> {
            Ok(Some(self.0))
        }
    }

    let store = MemoryStore::new();
    let service = ApprovalService::new(
        store.clone(),
        ApprovalRules::default(),
        ProvisionDefaults::standard_map(),
        Arc::new(FlatRate(42.0)),
        Arc::new(SystemIdentity),
    );

    let item = Uuid::new_v4();
    let day = future(4);
    let request = pending_request(ProviderType::Other, item, day, day, 1);
    let request_id = request.id;
    store.put_request(request);

    let allocation = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds");
    assert_eq!(allocation.allocated_price, 42.0);
}

#[tokio::test]
async fn retry_gives_up_with_deadlock_code_when_lock_never_frees() {
    use voya_store::{Store, StoreTx};

    let store = MemoryStore::new().with_lock_wait(std::time::Duration::from_millis(20));
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let day = future(5);
    let request = pending_request(ProviderType::Other, item, day, day, 1);
    let request_id = request.id;
    store.put_request(request);

    // a foreign transaction parks on the request row and never lets go
    let mut blocker = store.begin().await.unwrap();
    blocker.lock_request(request_id).await.unwrap();

    let err = service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DEADLOCK_RETRY");

    blocker.rollback().await.unwrap();

    // once the blocker is gone the same request approves normally
    service
        .approve_request(request_id, &ApprovalOptions::default())
        .await
        .expect("approval succeeds after the lock clears");
}

#[tokio::test]
async fn version_moving_between_read_and_debit_aborts_the_reservation() {
    use async_trait::async_trait;
    use voya_approval::{LedgerStrategy, NoDynamicPricing, ReservationStrategy};
    use voya_domain::Allocation;
    use voya_store::{MemoryTx, Store, StoreError, StoreTx};

    // Hands out rows normally but bumps the stored version right after
    // every locked read, standing in for a writer that commits between
    // the read and the debit.
    struct ShiftedTx {
        inner: MemoryTx,
        store: MemoryStore,
    }

    #[async_trait]
    impl StoreTx for ShiftedTx {
        async fn lock_request(&mut self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
            self.inner.lock_request(id).await
        }

        async fn mark_request_approved(
            &mut self,
            id: Uuid,
            approver: &str,
            notes: Option<&str>,
            terms: Option<&str>,
        ) -> Result<(), StoreError> {
            self.inner.mark_request_approved(id, approver, notes, terms).await
        }

        async fn ledger_row_for_update(
            &mut self,
            provider_type: ProviderType,
            item_id: Uuid,
            date: NaiveDate,
        ) -> Result<Option<CapacityRow>, StoreError> {
            let row = self.inner.ledger_row_for_update(provider_type, item_id, date).await?;
            if let Some(mut moved) = self.store.ledger_snapshot(provider_type, item_id, date) {
                moved.version += 1;
                self.store.put_ledger_row(moved);
            }
            Ok(row)
        }

        async fn insert_ledger_row(&mut self, row: &CapacityRow) -> Result<(), StoreError> {
            self.inner.insert_ledger_row(row).await
        }

        async fn debit_ledger(
            &mut self,
            provider_type: ProviderType,
            item_id: Uuid,
            date: NaiveDate,
            quantity: i32,
            expected_version: i64,
        ) -> Result<bool, StoreError> {
            self.inner
                .debit_ledger(provider_type, item_id, date, quantity, expected_version)
                .await
        }

        async fn credit_ledger(
            &mut self,
            provider_type: ProviderType,
            item_id: Uuid,
            date: NaiveDate,
            quantity: i32,
        ) -> Result<bool, StoreError> {
            self.inner.credit_ledger(provider_type, item_id, date, quantity).await
        }

        async fn lock_flight(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError> {
            self.inner.lock_flight(id).await
        }

        async fn debit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<bool, StoreError> {
            self.inner.debit_seats(flight_id, count).await
        }

        async fn credit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<(), StoreError> {
            self.inner.credit_seats(flight_id, count).await
        }

        async fn count_rooms(&mut self, hotel_item_id: Uuid) -> Result<i64, StoreError> {
            self.inner.count_rooms(hotel_item_id).await
        }

        async fn count_available_rooms(
            &mut self,
            hotel_item_id: Uuid,
            check_in: NaiveDate,
            check_out: NaiveDate,
            occupancy: i32,
        ) -> Result<i64, StoreError> {
            self.inner
                .count_available_rooms(hotel_item_id, check_in, check_out, occupancy)
                .await
        }

        async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), StoreError> {
            self.inner.insert_allocation(allocation).await
        }

        async fn lock_allocation(&mut self, id: Uuid) -> Result<Option<Allocation>, StoreError> {
            self.inner.lock_allocation(id).await
        }

        async fn mark_allocation_released(
            &mut self,
            id: Uuid,
            released_by: &str,
            reason: Option<&str>,
        ) -> Result<(), StoreError> {
            self.inner.mark_allocation_released(id, released_by, reason).await
        }

        async fn commit(self) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(self) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    let store = MemoryStore::new();
    let item = Uuid::new_v4();
    let day = future(6);
    store.put_ledger_row(ledger_row(ProviderType::Other, item, day, 10, 25.0));

    let strategy = LedgerStrategy::new(ProvisionDefaults::standard_map(), Arc::new(NoDynamicPricing));
    let request = pending_request(ProviderType::Other, item, day, day, 1);

    let mut tx = ShiftedTx {
        inner: store.begin().await.unwrap(),
        store: store.clone(),
    };
    let err = strategy
        .reserve(&mut tx, &request, &ApprovalOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OPTIMISTIC_LOCK_FAILED");
    match err {
        ApprovalError::OptimisticLockFailed { date } => assert_eq!(date, day),
        other => panic!("expected a lost version race, got {other:?}"),
    }
    tx.rollback().await.unwrap();

    // the losing attempt debited nothing
    let row = store.ledger_snapshot(ProviderType::Other, item, day).unwrap();
    assert_eq!(row.allocated_capacity, 0);
    assert_eq!(row.available_capacity, 10);
}

#[tokio::test]
async fn availability_summary_reports_unprovisioned_dates() {
    let store = MemoryStore::new();
    let service = ApprovalService::with_defaults(store.clone());

    let item = Uuid::new_v4();
    let start = future(10);
    let mut row = ledger_row(ProviderType::Hotel, item, start, 40, 90.0);
    row.allocated_capacity = 12;
    row.available_capacity = 28;
    store.put_ledger_row(row);

    let days = service
        .availability_summary(ProviderType::Hotel, item, start, start + Duration::days(2))
        .await
        .expect("summary succeeds");

    assert_eq!(days.len(), 3);
    assert!(days[0].provisioned);
    assert_eq!(days[0].available_capacity, 28);
    assert_eq!(days[0].version, Some(1));
    assert!(!days[1].provisioned);
    assert_eq!(days[1].total_capacity, 50);
    assert_eq!(days[1].version, None);
}
