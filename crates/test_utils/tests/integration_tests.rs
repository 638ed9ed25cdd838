//! Integration Tests for the atacarejo back office
//!
//! These tests verify cross-domain workflows and end-to-end scenarios
//! that involve multiple crates working together. The database scenarios
//! start a PostgreSQL container and are ignored unless Docker is available.

use chrono::{Days, Utc};
use core_kernel::{Currency, DateRange, Money, Timezone, UserId};
use rust_decimal_macros::dec;
use test_utils::*;

mod order_to_boleto_workflow {
    use super::*;
    use domain_finance::{
        BoletoIssuer, BoletoStatus, DreReport, Ledger, OverdueSweep, Receivable, ReceivableStatus,
    };

    fn receivables_for(order: &domain_orders::Order) -> Vec<Receivable> {
        let plan = order
            .installment_plan(TemporalFixtures::today(), &TemporalFixtures::calendar())
            .expect("installment plan");
        assert_installments_cover(order, &plan);
        plan.iter()
            .map(|i| {
                Receivable::new(order.tenant_id, order.customer_id, format!("Parcela {}", i.number), i.amount, i.due_date)
                    .expect("receivable")
                    .for_order(order.id, i.number)
            })
            .collect()
    }

    /// A three-installment wholesale sale becomes three valid boletos
    #[test]
    fn test_installments_become_boletos() {
        let order = TestOrderBuilder::new()
            .with_boleto_installments(3)
            .add_line(CatalogFixtures::oil_box(IdFixtures::tenant_id()), dec!(4))
            .build_confirmed(TemporalFixtures::weekday_morning())
            .expect("confirmed order");

        let account = TestBankAccountBuilder::new().build();
        let issuer = BoletoIssuer::default();
        let receivables = receivables_for(&order);
        assert_eq!(receivables.len(), 3);

        let boletos: Vec<_> = receivables
            .iter()
            .enumerate()
            .map(|(n, r)| issuer.issue(r, &account, n as u64 + 1, TemporalFixtures::weekday_morning()).expect("boleto"))
            .collect();

        for (boleto, receivable) in boletos.iter().zip(&receivables) {
            assert_valid_boleto(boleto);
            assert_eq!(boleto.amount, receivable.amount);
            assert_eq!(boleto.due_date, receivable.due_date);
        }
        let amounts: Vec<Money> = boletos.iter().map(|b| b.amount).collect();
        assert_money_sum(&amounts, &order.total);
    }

    /// Paying on time settles the receivable with no charges
    #[test]
    fn test_on_time_payment_settles_receivable() {
        let order = TestOrderBuilder::new()
            .with_boleto_installments(1)
            .build_confirmed(TemporalFixtures::weekday_morning())
            .expect("confirmed order");
        let account = TestBankAccountBuilder::new().build();
        let mut receivable = receivables_for(&order).remove(0);
        let mut boleto = BoletoIssuer::default()
            .issue(&receivable, &account, 1, TemporalFixtures::weekday_morning())
            .expect("boleto");

        let paid_at = TemporalFixtures::weekday_afternoon();
        let payment = boleto.pay(boleto.amount, paid_at, &Timezone::default()).expect("payment");
        assert_money_zero(&payment.charges);

        let status = receivable
            .register_payment(payment.total, payment.charges, paid_at)
            .expect("receivable payment");
        assert_eq!(status, ReceivableStatus::Paid);
        assert_money_zero(&receivable.outstanding());
    }

    /// Late boletos are swept, then paid with fine and interest that land
    /// under financial income on the DRE
    #[test]
    fn test_late_payment_charges_reach_the_dre() {
        let order = TestOrderBuilder::new()
            .with_boleto_installments(1)
            .build_confirmed(TemporalFixtures::weekday_morning())
            .expect("confirmed order");
        let account = TestBankAccountBuilder::new().build();
        let mut receivables = receivables_for(&order);
        let mut boletos = vec![BoletoIssuer::default()
            .issue(&receivables[0], &account, 7, TemporalFixtures::weekday_morning())
            .expect("boleto")];

        let due = boletos[0].due_date;
        let late = due.checked_add_days(Days::new(10)).expect("date");
        let report = OverdueSweep::default().run(late, &mut boletos, &mut receivables);
        assert_eq!(report.boletos_marked, vec![boletos[0].id]);
        assert_eq!(boletos[0].status, BoletoStatus::Overdue);
        assert_eq!(receivables[0].status, ReceivableStatus::Overdue);

        // 490.00 + 2% fine + 1% a month pro rata for 10 days
        let due_amount = boletos[0].amount_due(late);
        assert_eq!(due_amount, Money::brl(dec!(501.43)));

        let paid_at = Timezone::default().start_of_day(late) + chrono::Duration::hours(12);
        let payment = boletos[0].pay(due_amount, paid_at, &Timezone::default()).expect("payment");
        assert_eq!(payment.charges, Money::brl(dec!(11.43)));
        receivables[0]
            .register_payment(payment.total, payment.charges, paid_at)
            .expect("receivable payment");
        assert_eq!(receivables[0].status, ReceivableStatus::Paid);

        let mut ledger = Ledger::new(account.tenant_id, Currency::BRL);
        let account_id = account.id;
        ledger.add_account(account).expect("account");
        for entry in payment.ledger_entries(ledger.tenant_id(), &boletos[0].our_number).expect("entries") {
            ledger.record_settled(entry, paid_at).expect("settled");
        }
        assert_eq!(
            ledger.balance(&account_id),
            Some(Money::brl(dec!(10501.43)))
        );

        let period = DateRange::new(late, late).expect("period");
        let dre = DreReport::build(period, ledger.entries()).expect("dre");
        assert_eq!(dre.gross_revenue, Money::brl(dec!(490.00)));
        assert_eq!(dre.financial_income, Money::brl(dec!(11.43)));
        assert_eq!(dre.net_result, Money::brl(dec!(501.43)));
    }
}

mod payroll_workflow {
    use super::*;
    use domain_finance::{DreReport, EntryCategory, Ledger};
    use domain_hr::{PayrollInput, PayrollRun, PayrollStatus, PayrollTables};

    /// A paid payroll shows up as a Payroll operating expense
    #[test]
    fn test_paid_payroll_becomes_operating_expense() {
        let reference = TemporalFixtures::payroll_month();
        let employees = vec![
            TestEmployeeBuilder::new().build(),
            TestEmployeeBuilder::new()
                .with_role("Operador de caixa")
                .with_salary(Money::brl(dec!(4200.00)))
                .with_dependents(2)
                .build(),
            // Left before February: no payslip
            TestEmployeeBuilder::new()
                .terminated_on(chrono::NaiveDate::from_ymd_opt(2026, 1, 20).expect("date"))
                .build(),
        ];
        let inputs: Vec<_> = employees
            .into_iter()
            .map(|e| PayrollInput::new(e, reference))
            .collect();

        let mut run = PayrollRun::prepare(IdFixtures::tenant_id(), reference, &inputs, &PayrollTables::default())
            .expect("payroll");
        assert_eq!(run.payslips.len(), 2);
        for slip in &run.payslips {
            assert_money_positive(&slip.net);
            assert!(slip.net < slip.gross);
        }

        let now = TemporalFixtures::weekday_morning();
        run.approve(UserId::new(), now).expect("approve");
        let account = TestBankAccountBuilder::new()
            .with_opening_balance(Money::brl(dec!(20000.00)))
            .build();
        let account_id = account.id;
        let entries = run.pay(account_id, now).expect("pay");
        assert_eq!(run.status, PayrollStatus::Paid);

        let mut ledger = Ledger::new(IdFixtures::tenant_id(), Currency::BRL);
        ledger.add_account(account).expect("account");
        for entry in entries {
            ledger.record_settled(entry, now).expect("settled");
        }

        let total_net = run.total_net();
        let expected_balance = Money::brl(dec!(20000.00)).checked_sub(&total_net).expect("balance");
        assert_eq!(ledger.balance(&account_id), Some(expected_balance));

        let dre = DreReport::build(run.period, ledger.entries()).expect("dre");
        assert_eq!(dre.operating_expenses, total_net);
        assert_eq!(dre.expenses_by_category.get(&EntryCategory::Payroll), Some(&total_net));
    }
}

mod loyalty_workflow {
    use super::*;
    use domain_loyalty::{LoyaltyAccount, LoyaltyProgram, Referral, ReferralStatus};
    use domain_messaging::{MessageTemplate, Templates};

    /// A referred customer's first delivery rewards the referrer
    #[test]
    fn test_first_delivery_rewards_referrer() {
        let program = LoyaltyProgram::default();
        let tenant = IdFixtures::tenant_id();
        let referrer = TestCustomerBuilder::new().with_referral_code("MARIA10").build();
        let referred = TestCustomerBuilder::retail().build();
        let now = TemporalFixtures::weekday_morning();

        let mut referral = Referral::register(tenant, referrer.id, referred.id, "MARIA10", &[], now)
            .expect("referral");

        let mut order = TestOrderBuilder::new()
            .for_customer(referred.clone())
            .build_confirmed(now)
            .expect("order");
        order.start_preparing().expect("preparing");
        order.dispatch().expect("dispatch");
        order.deliver(TemporalFixtures::weekday_afternoon()).expect("deliver");

        let mut buyer_account = LoyaltyAccount::open(tenant, referred.id);
        let earned = buyer_account.earn(&order.total, &program);
        assert_eq!(earned, LoyaltyAccount::points_for(&order.total, &program));
        assert!(earned > 0);

        let mut referrer_account = LoyaltyAccount::open(tenant, referrer.id);
        referral.qualify(&order.total, &program, now).expect("qualify");
        let points = referral
            .reward(&mut referrer_account, &program, now)
            .expect("reward");
        assert_eq!(points, program.referral_reward_points);
        assert_eq!(referral.status, ReferralStatus::Rewarded);
        assert_eq!(referrer_account.points_balance, points);

        let text = Templates::pt_br()
            .expect("templates")
            .render(&MessageTemplate::ReferralReward {
                customer_name: referrer.name.clone(),
                referred_name: referred.name.clone(),
                points,
            })
            .expect("render");
        assert!(text.contains(&referrer.name));
        assert!(text.contains(&points.to_string()));
    }
}

mod fiscal_workflow {
    use super::*;
    use core_kernel::Rate;
    use domain_fiscal::{FiscalInvoice, FiscalInvoiceStatus, FiscalItem, FiscalModel, HomologationAuthorizer};

    /// A delivered wholesale order is invoiced on an NF-e and authorized
    #[tokio::test]
    async fn test_order_invoice_is_authorized() {
        let tenant = IdFixtures::tenant_id();
        let rice = CatalogFixtures::rice(tenant);
        let beans = CatalogFixtures::beans(tenant);
        let customer = TestCustomerBuilder::new().build();
        let order = TestOrderBuilder::new()
            .for_customer(customer.clone())
            .with_lines(vec![(rice.clone(), dec!(20)), (beans.clone(), dec!(24))])
            .build_confirmed(TemporalFixtures::weekday_morning())
            .expect("order");

        let mut invoice = FiscalInvoice::new(tenant, FiscalModel::NFe, 1, 1, DocumentFixtures::cnpj(), SP_UF_CODE)
            .for_order(order.id)
            .with_recipient(customer.document.clone().expect("document"));
        for (item, product) in order.items.iter().zip([&rice, &beans]) {
            invoice
                .add_item(FiscalItem {
                    product_code: product.sku.clone(),
                    description: item.description.clone(),
                    ncm: product.ncm.clone().expect("ncm"),
                    cfop: "5102".to_string(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    icms_rate: Rate::from_percentage(dec!(18)),
                })
                .expect("item");
        }
        assert_eq!(invoice.totals.total, order.total);

        let authorizer = HomologationAuthorizer::new();
        let status = invoice
            .authorize(&authorizer, TemporalFixtures::weekday_afternoon())
            .await
            .expect("authorize");
        assert_eq!(status, FiscalInvoiceStatus::Authorized);
        assert_eq!(invoice.access_key.as_ref().map(|k| k.digits().len()), Some(44));
        assert!(invoice.protocol.is_some());
    }
}

mod database_workflows {
    use super::*;
    use chrono::Duration;
    use domain_finance::{
        BoletoIssuer, BoletoStatus, ClosingBuilder, EntryCategory, FinanceError, FinancialEntry,
        OverdueSweep, Receivable, ReceivableStatus,
    };
    use domain_orders::{BusinessRules, OrderStatus, PaymentMethod};
    use infra_db::{DatabaseError, FinanceRepository, OrderRepository};
    use test_utils::db_test;

    db_test!(test_boleto_sale_is_paid_then_swept, |db| {
        let tenant = db.create_tenant("Atacarejo Central").await.expect("tenant");
        let tenant_id = tenant.tenant_id();
        let orders = OrderRepository::new(db.pool().clone());
        let finance = FinanceRepository::new(db.pool().clone());

        let customer = TestCustomerBuilder::new().with_tenant(tenant_id).build();
        orders.insert_customer(&customer).await.expect("customer");
        let rice = CatalogFixtures::rice(tenant_id);
        orders.insert_product(&rice).await.expect("product");
        let account = TestBankAccountBuilder::new().with_tenant(tenant_id).build();
        finance.insert_bank_account(&account).await.expect("account");

        let order = TestOrderBuilder::new()
            .with_tenant(tenant_id)
            .for_customer(customer.clone())
            .with_lines(vec![(rice, dec!(20))])
            .with_boleto_installments(2)
            .build()
            .expect("order");
        orders.insert_order(&order).await.expect("insert order");

        let rules = BusinessRules::new(core_kernel::BusinessCalendar::new(tenant.timezone()));
        let now = Utc::now();
        let confirmed = finance
            .confirm_order_receivables(tenant_id, order.id, &rules, &BoletoIssuer::default(), Some(account.id), now)
            .await
            .expect("confirm");
        assert_eq!(confirmed.receivables.len(), 2);
        assert_eq!(confirmed.boletos.len(), 2);
        confirmed.boletos.iter().for_each(assert_valid_boleto);
        assert_eq!(
            finance.open_balance(tenant_id, customer.id).await.expect("balance"),
            order.total
        );

        let first = &confirmed.boletos[0];
        let (paid, payment) = finance
            .pay_boleto(tenant_id, first.id, first.amount, now, &tenant.timezone())
            .await
            .expect("pay");
        assert_money_zero(&payment.charges);
        assert!(!paid.status.is_open());
        let balance = finance.find_bank_account(tenant_id, account.id).await.expect("account").balance;
        assert_eq!(balance, account.balance.checked_add(&first.amount).expect("sum"));

        let second = &confirmed.boletos[1];
        let late = second.due_date.checked_add_days(Days::new(3)).expect("date");
        let report = finance
            .run_overdue_sweep(tenant_id, late, &OverdueSweep::default())
            .await
            .expect("sweep");
        assert_eq!(report.boletos_marked, vec![second.id]);
        assert_eq!(report.receivables_marked, vec![second.receivable_id]);

        let again = finance
            .run_overdue_sweep(tenant_id, late, &OverdueSweep::default())
            .await
            .expect("second sweep");
        assert_eq!(again.total_marked(), 0);
    });

    db_test!(test_pix_sale_settles_income, |db| {
        let tenant = db.create_tenant("Atacarejo Pix").await.expect("tenant");
        let tenant_id = tenant.tenant_id();
        let orders = OrderRepository::new(db.pool().clone());
        let finance = FinanceRepository::new(db.pool().clone());

        let customer = TestCustomerBuilder::retail().with_tenant(tenant_id).build();
        orders.insert_customer(&customer).await.expect("customer");
        let beans = CatalogFixtures::beans(tenant_id);
        orders.insert_product(&beans).await.expect("product");
        let drawer = TestBankAccountBuilder::cash_drawer().with_tenant(tenant_id).build();
        finance.insert_bank_account(&drawer).await.expect("account");

        let order = TestOrderBuilder::new()
            .with_tenant(tenant_id)
            .for_customer(customer)
            .with_lines(vec![(beans, dec!(6))])
            .with_payment(PaymentMethod::Pix)
            .build()
            .expect("order");
        orders.insert_order(&order).await.expect("insert order");

        let rules = BusinessRules::new(core_kernel::BusinessCalendar::new(tenant.timezone()));
        let confirmed = finance
            .confirm_order_receivables(tenant_id, order.id, &rules, &BoletoIssuer::default(), Some(drawer.id), Utc::now())
            .await
            .expect("confirm");
        assert!(confirmed.receivables.is_empty());
        assert_eq!(confirmed.entries.len(), 1);
        assert!(confirmed.entries[0].is_settled());

        let balance = finance.find_bank_account(tenant_id, drawer.id).await.expect("account").balance;
        assert_eq!(balance, order.total);
    });

    db_test!(test_sweep_all_covers_every_store, |db| {
        let finance = FinanceRepository::new(db.pool().clone());
        let orders = OrderRepository::new(db.pool().clone());
        let now = Utc::now();
        let mut expected = Vec::new();

        for name in ["Loja Norte", "Loja Sul"] {
            let tenant = db.create_tenant(name).await.expect("tenant");
            let customer = TestCustomerBuilder::new().with_tenant(tenant.tenant_id()).build();
            orders.insert_customer(&customer).await.expect("customer");

            let today = tenant.timezone().local_date(now);
            let due = today.checked_sub_days(Days::new(10)).expect("date");
            let receivable = Receivable::new(tenant.tenant_id(), customer.id, "Fiado", Money::brl(dec!(150.00)), due)
                .expect("receivable");
            finance.insert_receivable(&receivable).await.expect("insert");
            expected.push(receivable.id);
        }

        let report = finance
            .run_overdue_sweep_all(now, &OverdueSweep::default())
            .await
            .expect("sweep");
        assert_eq!(report.receivables_marked.len(), 2);
        for id in &expected {
            assert!(report.receivables_marked.contains(id));
        }

        let tenants = infra_db::TenantRepository::new(db.pool().clone())
            .list_active()
            .await
            .expect("tenants");
        for tenant in tenants {
            let open = finance
                .list_receivables(tenant.tenant_id(), Some(ReceivableStatus::Overdue), None)
                .await
                .expect("list");
            assert_eq!(open.len(), 1);
        }

        let rerun = finance
            .run_overdue_sweep_all(now, &OverdueSweep::default())
            .await
            .expect("second sweep");
        assert_eq!(rerun.total_marked(), 0);
    });

    db_test!(test_boleto_reversal_restores_balance_and_reopens, |db| {
        let tenant = db.create_tenant("Atacarejo Estorno").await.expect("tenant");
        let tenant_id = tenant.tenant_id();
        let tz = tenant.timezone();
        let orders = OrderRepository::new(db.pool().clone());
        let finance = FinanceRepository::new(db.pool().clone());

        let customer = TestCustomerBuilder::new().with_tenant(tenant_id).build();
        orders.insert_customer(&customer).await.expect("customer");
        let rice = CatalogFixtures::rice(tenant_id);
        orders.insert_product(&rice).await.expect("product");
        let account = TestBankAccountBuilder::new().with_tenant(tenant_id).build();
        finance.insert_bank_account(&account).await.expect("account");

        let order = TestOrderBuilder::new()
            .with_tenant(tenant_id)
            .for_customer(customer)
            .with_lines(vec![(rice, dec!(10))])
            .with_boleto_installments(1)
            .build()
            .expect("order");
        orders.insert_order(&order).await.expect("insert order");

        let now = TemporalFixtures::weekday_morning();
        let rules = BusinessRules::new(core_kernel::BusinessCalendar::new(tz));
        let confirmed = finance
            .confirm_order_receivables(tenant_id, order.id, &rules, &BoletoIssuer::default(), Some(account.id), now)
            .await
            .expect("confirm");
        let boleto = &confirmed.boletos[0];

        let too_much = boleto.amount.checked_add(&Money::brl(dec!(1000))).expect("sum");
        let rejected = finance
            .pay_boleto(tenant_id, boleto.id, too_much, now, &tz)
            .await
            .unwrap_err();
        assert!(matches!(rejected, DatabaseError::Finance(FinanceError::Overpayment { .. })));
        let untouched = finance.find_bank_account(tenant_id, account.id).await.expect("account").balance;
        assert_eq!(untouched, account.balance);

        finance
            .pay_boleto(tenant_id, boleto.id, boleto.amount, now + Duration::hours(1), &tz)
            .await
            .expect("pay");
        let reversed = finance
            .reverse_boleto_payment(
                tenant_id,
                boleto.id,
                "cheque devolvido",
                now + Duration::hours(2),
                &tz,
                &OverdueSweep::default(),
            )
            .await
            .expect("reverse");
        assert_eq!(reversed.status, BoletoStatus::Pending);

        let balance = finance.find_bank_account(tenant_id, account.id).await.expect("account").balance;
        assert_eq!(balance, account.balance);
        let receivable = finance
            .find_receivable(tenant_id, boleto.receivable_id)
            .await
            .expect("receivable");
        assert_eq!(receivable.status, ReceivableStatus::Pending);
        assert_eq!(
            finance.open_balance(tenant_id, receivable.customer_id).await.expect("open balance"),
            boleto.amount
        );

        let entries = finance
            .entries_for_period(tenant_id, &DateRange::month(2026, 3).expect("month"), Some(account.id))
            .await
            .expect("entries");
        let reversals = entries.iter().filter(|e| e.reversal_of.is_some()).count();
        assert!(reversals > 0);
        assert_eq!(reversals * 2, entries.len());
    });

    db_test!(test_closed_period_rejects_overlap_and_new_entries, |db| {
        let tenant = db.create_tenant("Atacarejo Fechamento").await.expect("tenant");
        let tenant_id = tenant.tenant_id();
        let finance = FinanceRepository::new(db.pool().clone());
        let account = TestBankAccountBuilder::new().with_tenant(tenant_id).build();
        finance.insert_bank_account(&account).await.expect("account");

        let now = TemporalFixtures::weekday_morning();
        let february = DateRange::month(2026, 2).expect("month");
        let closing = finance
            .close_period(tenant_id, february, &ClosingBuilder::default(), UserId::new(), now)
            .await
            .expect("close");

        let straddling = DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2026, 2, 20).expect("date"),
            chrono::NaiveDate::from_ymd_opt(2026, 3, 5).expect("date"),
        )
        .expect("range");
        let overlap = finance
            .close_period(tenant_id, straddling, &ClosingBuilder::default(), UserId::new(), now)
            .await
            .unwrap_err();
        assert!(matches!(overlap, DatabaseError::Finance(FinanceError::OverlappingPeriod(_))));

        // A writer that skips the domain check still hits the exclusion constraint
        let raw = sqlx::query(
            r#"
            INSERT INTO financial_closings
                (id, tenant_id, period_start, period_end, accounts, total_income,
                 total_expense, net_result, currency, status, closed_by, closed_at)
            SELECT $1, tenant_id, $2, $3, accounts, total_income,
                   total_expense, net_result, currency, status, closed_by, closed_at
            FROM financial_closings WHERE id = $4
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(straddling.start)
        .bind(straddling.end)
        .bind(*closing.id.as_uuid())
        .execute(db.pool())
        .await
        .unwrap_err();
        assert!(matches!(DatabaseError::from(raw), DatabaseError::PeriodOverlap(_)));

        let late_entry = FinancialEntry::income(
            tenant_id,
            account.id,
            EntryCategory::Sales,
            "Venda esquecida",
            Money::brl(dec!(50.00)),
            chrono::NaiveDate::from_ymd_opt(2026, 2, 14).expect("date"),
        )
        .expect("entry");
        let refused = finance.record_entry(late_entry, Some(now)).await.unwrap_err();
        assert!(matches!(refused, DatabaseError::Finance(FinanceError::PeriodClosed(_))));

        let balance = finance.find_bank_account(tenant_id, account.id).await.expect("account").balance;
        assert_eq!(balance, account.balance);
    });

    db_test!(test_cancelling_pix_sale_reverses_drawer_income, |db| {
        let tenant = db.create_tenant("Atacarejo Cancelamento").await.expect("tenant");
        let tenant_id = tenant.tenant_id();
        let orders = OrderRepository::new(db.pool().clone());
        let finance = FinanceRepository::new(db.pool().clone());

        let customer = TestCustomerBuilder::retail().with_tenant(tenant_id).build();
        orders.insert_customer(&customer).await.expect("customer");
        let beans = CatalogFixtures::beans(tenant_id);
        orders.insert_product(&beans).await.expect("product");
        let drawer = TestBankAccountBuilder::cash_drawer().with_tenant(tenant_id).build();
        finance.insert_bank_account(&drawer).await.expect("account");

        let order = TestOrderBuilder::new()
            .with_tenant(tenant_id)
            .for_customer(customer)
            .with_lines(vec![(beans, dec!(4))])
            .with_payment(PaymentMethod::Pix)
            .build()
            .expect("order");
        orders.insert_order(&order).await.expect("insert order");

        let now = TemporalFixtures::weekday_morning();
        let rules = BusinessRules::new(core_kernel::BusinessCalendar::new(tenant.timezone()));
        let confirmed = finance
            .confirm_order_receivables(tenant_id, order.id, &rules, &BoletoIssuer::default(), Some(drawer.id), now)
            .await
            .expect("confirm");
        let income = confirmed.entries[0].id;
        let after_sale = finance.find_bank_account(tenant_id, drawer.id).await.expect("account").balance;
        assert_eq!(after_sale, order.total);

        let cancelled = finance
            .cancel_order(tenant_id, order.id, "cliente desistiu", &rules, now + Duration::minutes(30))
            .await
            .expect("cancel");
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let balance = finance.find_bank_account(tenant_id, drawer.id).await.expect("account").balance;
        assert_eq!(balance, drawer.balance);
        let entries = finance
            .entries_for_period(tenant_id, &DateRange::month(2026, 3).expect("month"), Some(drawer.id))
            .await
            .expect("entries");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.reversal_of == Some(income)));
    });
}
