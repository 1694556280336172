#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::commands::expense::{
        create_expense_internal, delete_expense_internal, CreateExpenseInput, DeleteExpenseInput,
    };
    use crate::commands::leads::handover::{handover_lead_internal, HandoverInput};
    use crate::commands::leads::intake::{
        create_lead_internal, delete_lead_internal, list_leads_internal,
        update_lead_status_internal, CreateLeadInput,
    };
    use crate::commands::leads::items::{
        add_additional_item_internal, add_provided_item_internal, delete_additional_item_internal,
        delete_provided_item_internal, initialize_lead_internal, update_provided_item_internal,
        AddAdditionalItemInput, AddProvidedItemInput, AdditionalItemInput, DeleteItemInput,
        InitLeadInput, ProvidedItemInput, UpdateProvidedItemInput,
    };
    use crate::commands::vendor::{
        assign_vendor_internal, record_payout_internal, save_vendor_internal,
        unassign_vendor_internal, AssignVendorInput, UnassignVendorInput, VendorInput,
        VendorPayoutInput,
    };
    use crate::db::{self, DbPool};
    use crate::error::ArborError;
    use chrono::{TimeZone, Utc};
    use std::time::{SystemTime, UNIX_EPOCH};

    async fn setup_test_db() -> DbPool {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    fn unique_suffix() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }

    async fn create_test_user(pool: &DbPool) -> i32 {
        let row: (i32,) = sqlx::query_as(
            "INSERT INTO users (emp_no, name, role, store) VALUES ($1, 'Test Manager', 'STORE_MANAGER', 'Test Store') RETURNING id",
        )
        .bind(format!("T{}", unique_suffix()))
        .fetch_one(pool)
        .await
        .expect("Failed to create test user");
        row.0
    }

    async fn create_test_lead(pool: &DbPool) -> (i32, String) {
        let lead_no = format!("LD-{}", unique_suffix());
        let id = create_lead_internal(
            pool,
            CreateLeadInput {
                lead_no: lead_no.clone(),
                store: Some("Test Store".to_string()),
                customer_name: "Integration Customer".to_string(),
                mobile_number: None,
                email: None,
                address: None,
                assignee_id: None,
            },
        )
        .await
        .expect("Failed to create test lead");
        (id, lead_no)
    }

    async fn init_empty(pool: &DbPool, lead_no: &str, user_id: i32) {
        initialize_lead_internal(
            pool,
            InitLeadInput {
                lead_no: lead_no.to_string(),
                status: None,
                user_id,
                additional_items: vec![],
                provided_items: vec![],
            },
        )
        .await
        .expect("Failed to initialize lead");
    }

    async fn lead_totals(pool: &DbPool, lead_id: i32) -> (i64, i64, i64, i64, i64, i64) {
        sqlx::query_as(
            "SELECT total_project_cost, total_gst, pay_in_cash, pay_in_online, total_exp, additional_items_cost
             FROM leads WHERE id = $1",
        )
        .bind(lead_id)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch lead totals")
    }

    async fn revenue_row(
        pool: &DbPool,
        user_id: i32,
        month: &str,
        year: &str,
    ) -> Option<(i64, i64, i32)> {
        sqlx::query_as(
            "SELECT total_profit, revenue, project_close FROM revenues
             WHERE user_id = $1 AND month = $2 AND year = $3",
        )
        .bind(user_id)
        .bind(month)
        .bind(year)
        .fetch_optional(pool)
        .await
        .expect("Failed to fetch revenue row")
    }

    async fn cleanup_user(pool: &DbPool, user_id: i32) {
        let _ = sqlx::query("DELETE FROM revenues WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM store_exp_notes WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await;
        let _ = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await;
    }

    async fn cleanup_lead(pool: &DbPool, lead_id: i32) {
        // Line items and breakdowns cascade.
        let _ = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(lead_id)
            .execute(pool)
            .await;
    }

    #[tokio::test]
    async fn test_additional_item_round_trip() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        let before = lead_totals(&pool, lead_id).await;
        assert_eq!(before, (0, 0, 0, 0, 0, 0));

        let item_id = add_additional_item_internal(
            &pool,
            AddAdditionalItemInput {
                lead_id,
                item: AdditionalItemInput {
                    category: "Lighting".to_string(),
                    detail: Some("Pendant set".to_string()),
                    price: 1000,
                    gst: 50,
                    landing_price: 200,
                },
            },
        )
        .await
        .expect("add_additional_item failed");

        let after_add = lead_totals(&pool, lead_id).await;
        assert_eq!(after_add, (1000, 50, 0, 0, 200, 1000));

        delete_additional_item_internal(&pool, DeleteItemInput { item_id, lead_id })
            .await
            .expect("delete_additional_item failed");

        let after_delete = lead_totals(&pool, lead_id).await;
        assert_eq!(after_delete, before, "delete must reverse the add exactly");

        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_provided_item_add_update_delete_net_zero() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        let item_id = add_provided_item_internal(
            &pool,
            AddProvidedItemInput {
                lead_id,
                item: ProvidedItemInput {
                    area: Some("Living Room".to_string()),
                    brand: Some("Oakline".to_string()),
                    model: None,
                    pay_in_cash: 500,
                    pay_in_online: 300,
                    gst: 40,
                },
            },
        )
        .await
        .expect("add_provided_item failed");

        update_provided_item_internal(
            &pool,
            UpdateProvidedItemInput {
                item_id,
                lead_id,
                item: ProvidedItemInput {
                    area: Some("Living Room".to_string()),
                    brand: Some("Oakline".to_string()),
                    model: Some("OL-220".to_string()),
                    pay_in_cash: 700,
                    pay_in_online: 100,
                    gst: 90,
                },
            },
        )
        .await
        .expect("update_provided_item failed");

        let after_update = lead_totals(&pool, lead_id).await;
        assert_eq!(after_update, (800, 90, 700, 100, 0, 0));

        delete_provided_item_internal(&pool, DeleteItemInput { item_id, lead_id })
            .await
            .expect("delete_provided_item failed");

        let after_delete = lead_totals(&pool, lead_id).await;
        assert_eq!(after_delete, (0, 0, 0, 0, 0, 0), "net effect must be zero");

        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_double_initialization_fails() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;

        initialize_lead_internal(
            &pool,
            InitLeadInput {
                lead_no: lead_no.clone(),
                status: None,
                user_id,
                additional_items: vec![AdditionalItemInput {
                    category: "Sofa".to_string(),
                    detail: None,
                    price: 2500,
                    gst: 125,
                    landing_price: 1800,
                }],
                provided_items: vec![],
            },
        )
        .await
        .expect("first initialization failed");

        let after_first = lead_totals(&pool, lead_id).await;
        assert_eq!(after_first, (2500, 125, 0, 0, 1800, 2500));

        let second = initialize_lead_internal(
            &pool,
            InitLeadInput {
                lead_no: lead_no.clone(),
                status: None,
                user_id,
                additional_items: vec![AdditionalItemInput {
                    category: "Sofa".to_string(),
                    detail: None,
                    price: 9999,
                    gst: 999,
                    landing_price: 999,
                }],
                provided_items: vec![],
            },
        )
        .await;

        assert!(matches!(second, Err(ArborError::Policy(_))));

        let after_second = lead_totals(&pool, lead_id).await;
        assert_eq!(after_second, after_first, "failed re-init must not touch totals");

        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_lead_deletion_policy() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;

        // Initialized lead refuses deletion.
        let (locked_id, locked_no) = create_test_lead(&pool).await;
        init_empty(&pool, &locked_no, user_id).await;
        let denied = delete_lead_internal(&pool, locked_id).await;
        assert!(matches!(denied, Err(ArborError::Policy(_))));

        // Uninitialized lead soft-deletes and disappears from reads.
        let (open_id, _) = create_test_lead(&pool).await;
        delete_lead_internal(&pool, open_id)
            .await
            .expect("soft delete failed");

        let deleted_at: (Option<chrono::DateTime<Utc>>,) =
            sqlx::query_as("SELECT deleted_at FROM leads WHERE id = $1")
                .bind(open_id)
                .fetch_one(&pool)
                .await
                .expect("lead row missing");
        assert!(deleted_at.0.is_some());

        let listed = list_leads_internal(&pool, None).await.expect("list failed");
        assert!(!listed.iter().any(|l| l.id == open_id));

        cleanup_lead(&pool, locked_id).await;
        cleanup_lead(&pool, open_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_expense_reversal_credits_original_month() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;

        // Logged under a January clock.
        let jan_clock = FixedClock(Utc.with_ymd_and_hms(2031, 1, 15, 10, 0, 0).unwrap());
        let expense_id = create_expense_internal(
            &pool,
            &jan_clock,
            CreateExpenseInput {
                user_id,
                amount: 5000,
                transaction_date: Some("2031-01-15".to_string()),
                remark: Some("Showroom repair".to_string()),
            },
        )
        .await
        .expect("create_expense failed");

        let jan = revenue_row(&pool, user_id, "January", "2031").await;
        assert_eq!(jan, Some((-5000, 0, 0)));

        // Deleted later (in February, wall-clock wise): the reversal still
        // lands on January via the stored transaction date.
        delete_expense_internal(&pool, DeleteExpenseInput { expense_id })
            .await
            .expect("delete_expense failed");

        let jan_after = revenue_row(&pool, user_id, "January", "2031").await;
        assert_eq!(jan_after, Some((0, 0, 0)));

        let feb = revenue_row(&pool, user_id, "February", "2031").await;
        assert!(feb.is_none(), "no bucket may appear for the deletion month");

        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_handover_applies_profit_snapshot() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        add_provided_item_internal(
            &pool,
            AddProvidedItemInput {
                lead_id,
                item: ProvidedItemInput {
                    area: Some("Bedroom".to_string()),
                    brand: None,
                    model: None,
                    pay_in_cash: 1000,
                    pay_in_online: 500,
                    gst: 100,
                },
            },
        )
        .await
        .expect("add_provided_item failed");

        add_additional_item_internal(
            &pool,
            AddAdditionalItemInput {
                lead_id,
                item: AdditionalItemInput {
                    category: "Freight".to_string(),
                    detail: None,
                    price: 0,
                    gst: 0,
                    landing_price: 300,
                },
            },
        )
        .await
        .expect("add_additional_item failed");

        update_lead_status_internal(&pool, lead_id, "WON")
            .await
            .expect("status update failed");

        let clock = FixedClock(Utc.with_ymd_and_hms(2031, 3, 1, 12, 0, 0).unwrap());
        let profit = handover_lead_internal(&pool, &clock, HandoverInput { user_id, lead_id })
            .await
            .expect("handover failed");
        assert_eq!(profit, 1100);

        // Fresh bucket is created with the snapshot values.
        let march = revenue_row(&pool, user_id, "March", "2031").await;
        assert_eq!(march, Some((1100, 1500, 1)));

        let (status, handover_date): (String, Option<chrono::NaiveDate>) =
            sqlx::query_as("SELECT status, handover_date FROM leads WHERE id = $1")
                .bind(lead_id)
                .fetch_one(&pool)
                .await
                .expect("lead row missing");
        assert_eq!(status, "CLOSED");
        assert!(handover_date.is_some());

        // CLOSED is terminal: a second handover is refused.
        let again = handover_lead_internal(&pool, &clock, HandoverInput { user_id, lead_id }).await;
        assert!(matches!(again, Err(ArborError::Policy(_))));

        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_vendor_assignment_and_reversal() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        let vendor_id = save_vendor_internal(
            &pool,
            VendorInput {
                vendor_id: None,
                vendor_name: format!("Vendor {}", unique_suffix()),
                mobile_number: None,
                city: Some("Pune".to_string()),
            },
        )
        .await
        .expect("save_vendor failed");

        let breakdown_id = assign_vendor_internal(
            &pool,
            AssignVendorInput {
                vendor_id,
                lead_id,
                price: 2000,
            },
        )
        .await
        .expect("assign_vendor failed");

        let charges: (i64, i64) =
            sqlx::query_as("SELECT total_charge, given_charge FROM vendors WHERE id = $1")
                .bind(vendor_id)
                .fetch_one(&pool)
                .await
                .expect("vendor row missing");
        assert_eq!(charges, (2000, 0));

        let breakdown: (i64, i64) =
            sqlx::query_as("SELECT total_amt, total_given FROM vendor_breakdowns WHERE id = $1")
                .bind(breakdown_id)
                .fetch_one(&pool)
                .await
                .expect("breakdown row missing");
        assert_eq!(breakdown, (2000, 0));

        // One row per (vendor, lead): re-assignment is refused.
        let duplicate = assign_vendor_internal(
            &pool,
            AssignVendorInput {
                vendor_id,
                lead_id,
                price: 999,
            },
        )
        .await;
        assert!(matches!(duplicate, Err(ArborError::Policy(_))));

        // Payouts accrue on both ledgers and cannot exceed the allocation.
        record_payout_internal(
            &pool,
            VendorPayoutInput {
                breakdown_id,
                amount: 500,
            },
        )
        .await
        .expect("payout failed");

        let over = record_payout_internal(
            &pool,
            VendorPayoutInput {
                breakdown_id,
                amount: 1600,
            },
        )
        .await;
        assert!(matches!(over, Err(ArborError::Validation(_))));

        // An assignment with disbursed money cannot be unwound.
        let blocked =
            unassign_vendor_internal(&pool, UnassignVendorInput { vendor_id, lead_id }).await;
        assert!(matches!(blocked, Err(ArborError::Policy(_))));

        let _ = sqlx::query("DELETE FROM vendor_breakdowns WHERE id = $1")
            .bind(breakdown_id)
            .execute(&pool)
            .await;
        let _ = sqlx::query("DELETE FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .execute(&pool)
            .await;
        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_vendor_unassignment_reverses_charge() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        let vendor_id = save_vendor_internal(
            &pool,
            VendorInput {
                vendor_id: None,
                vendor_name: format!("Vendor {}", unique_suffix()),
                mobile_number: None,
                city: None,
            },
        )
        .await
        .expect("save_vendor failed");

        assign_vendor_internal(
            &pool,
            AssignVendorInput {
                vendor_id,
                lead_id,
                price: 3000,
            },
        )
        .await
        .expect("assign_vendor failed");

        unassign_vendor_internal(&pool, UnassignVendorInput { vendor_id, lead_id })
            .await
            .expect("unassign failed");

        let charge: (i64,) = sqlx::query_as("SELECT total_charge FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .fetch_one(&pool)
            .await
            .expect("vendor row missing");
        assert_eq!(charge.0, 0, "unassignment must reverse the charge exactly");

        let _ = sqlx::query("DELETE FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .execute(&pool)
            .await;
        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }

    #[tokio::test]
    async fn test_concurrent_item_creates_lose_no_updates() {
        let pool = setup_test_db().await;
        let user_id = create_test_user(&pool).await;
        let (lead_id, lead_no) = create_test_lead(&pool).await;
        init_empty(&pool, &lead_no, user_id).await;

        const TASKS: i64 = 8;
        const PRICE: i64 = 250;

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                add_additional_item_internal(
                    &pool,
                    AddAdditionalItemInput {
                        lead_id,
                        item: AdditionalItemInput {
                            category: "Fixture".to_string(),
                            detail: None,
                            price: PRICE,
                            gst: 0,
                            landing_price: 0,
                        },
                    },
                )
                .await
            }));
        }

        for handle in handles {
            handle
                .await
                .expect("task panicked")
                .expect("concurrent add failed");
        }

        let (total_project_cost, _, _, _, _, additional_items_cost) =
            lead_totals(&pool, lead_id).await;
        assert_eq!(total_project_cost, TASKS * PRICE);
        assert_eq!(additional_items_cost, TASKS * PRICE);

        cleanup_lead(&pool, lead_id).await;
        cleanup_user(&pool, user_id).await;
    }
}
