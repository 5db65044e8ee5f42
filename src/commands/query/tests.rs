use rusqlite::Connection;

use super::enterprises::*;
use crate::commands::ingest::create_final_tables;
use crate::error::RegistryError;

fn seeded_store() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory DB should open");
    create_final_tables(&connection).expect("final tables should create");
    connection
        .execute_batch(
            "
            INSERT INTO code(category, code, language, description) VALUES
              ('Status', 'AC', 'NL', 'Actief'),
              ('Status', 'AC', 'FR', 'Actif'),
              ('JuridicalSituation', '000', 'NL', 'Normale toestand'),
              ('JuridicalSituation', '000', 'FR', 'Situation normale'),
              ('TypeOfEnterprise', '1', 'NL', 'Natuurlijk persoon'),
              ('TypeOfEnterprise', '2', 'NL', 'Rechtspersoon'),
              ('JuridicalForm', '014', 'NL', 'Naamloze vennootschap (NV)'),
              ('JuridicalForm', '014', 'FR', 'Société anonyme (SA)'),
              ('Nace2008', '62010', 'NL', 'Ontwerpen en programmeren van computerprogramma''s'),
              ('NACEBEL_2025', '62010', 'NL', 'Computerprogrammering'),
              ('NACEBEL_2025', '62010', 'FR', 'Programmation informatique');

            INSERT INTO enterprise(
              enterprise_number, status, juridical_situation, type_of_enterprise,
              juridical_form, juridical_form_cac, start_date
            ) VALUES
              ('0200.065.765', 'AC', '000', '2', '014', NULL, '1998-03-05'),
              ('0403.170.701', 'AC', '000', '2', 'BVBA', NULL, '2010-05-05'),
              ('0500.000.001', 'AC', '000', '1', NULL, NULL, '2015-01-01'),
              ('0600.000.002', 'AC', '000', '2', '999', '610', '2015-01-01');

            INSERT INTO denomination(entity_number, language, type_of_denomination, denomination) VALUES
              ('0200.065.765', '2', '001', 'Intercommunale Vlaanderen'),
              ('0200.065.765', '1', '001', 'Intercommunale de Flandre'),
              ('0200.065.765', '2', '002', 'IV'),
              ('0403.170.701', '2', '001', 'Acme Tools'),
              ('0500.000.001', '2', '003', 'Bakkerij Jansens');

            INSERT INTO address(
              entity_number, type_of_address, country_nl, country_fr, zipcode,
              municipality_nl, municipality_fr, street_nl, street_fr, house_number,
              box, extra_address_info, date_striking_off
            ) VALUES
              ('0200.065.765', 'REGO', NULL, NULL, '9000', 'Gent', 'Gand',
               'Kouter', 'Kouter', '1', 'A', NULL, NULL);

            INSERT INTO contact(entity_number, entity_contact, contact_type, value) VALUES
              ('0200.065.765', 'ENT', 'EMAIL', 'info@example.be');

            INSERT INTO activity(entity_number, activity_group, nace_version, nace_code, classification) VALUES
              ('0200.065.765', '001', 2008, '62010', 'MAIN'),
              ('0200.065.765', '001', 2025, '62010', 'MAIN'),
              ('0200.065.765', '001', 2008, '99999', 'SECO');
            ",
        )
        .expect("fixture rows should insert");
    connection
}

#[test]
fn pagination_falls_back_and_clamps() {
    assert_eq!(
        Pagination::sanitize(None, None),
        Pagination {
            page: 1,
            page_size: 20
        }
    );
    assert_eq!(
        Pagination::sanitize(Some("0"), Some("0")),
        Pagination {
            page: 1,
            page_size: 20
        }
    );
    assert_eq!(
        Pagination::sanitize(Some("-3"), Some("500")),
        Pagination {
            page: 1,
            page_size: 100
        }
    );
    assert_eq!(
        Pagination::sanitize(Some("abc"), Some("-5")),
        Pagination {
            page: 1,
            page_size: 1
        }
    );
    assert_eq!(
        Pagination::sanitize(Some("2"), Some(" 10 ")),
        Pagination {
            page: 2,
            page_size: 10
        }
    );
    assert_eq!(
        Pagination::sanitize(Some("9223372036854775807"), Some("20")),
        Pagination {
            page: i64::MAX / 100,
            page_size: 20
        }
    );
}

#[test]
fn list_with_huge_page_number_returns_an_empty_page() {
    let connection = seeded_store();

    let list = list_enterprises(
        &connection,
        None,
        Pagination::sanitize(Some("9223372036854775807"), Some("100")),
    )
    .expect("listing should succeed");

    assert_eq!(list.total, 4);
    assert!(list.items.is_empty());
}

#[test]
fn list_folds_case_of_accented_names() {
    let connection = seeded_store();
    connection
        .execute(
            "INSERT INTO denomination(entity_number, language, type_of_denomination, denomination)
             VALUES('0600.000.002', '1', '001', 'Société Générale')",
            [],
        )
        .expect("denomination should insert");

    for term in ["société", "SOCIÉTÉ", "Générale", "GÉNÉRALE"] {
        let list = list_enterprises(&connection, Some(term), Pagination::sanitize(None, None))
            .expect("search should succeed");
        assert_eq!(list.total, 1, "term {term}");
        assert_eq!(list.items[0].enterprise_number, "0600.000.002");
        assert_eq!(list.items[0].names, vec!["Société Générale"]);
    }
}

#[test]
fn list_orders_newest_first_and_classifies_raw_form() {
    let connection = seeded_store();

    let list = list_enterprises(&connection, None, Pagination::sanitize(None, None))
        .expect("listing should succeed");

    assert_eq!(list.total, 4);
    let numbers = list
        .items
        .iter()
        .map(|item| item.enterprise_number.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        numbers,
        vec!["0500.000.001", "0600.000.002", "0403.170.701", "0200.065.765"]
    );

    let acme = &list.items[2];
    assert_eq!(acme.juridical_form_group, "BV");
    assert_eq!(acme.names, vec!["Acme Tools"]);

    // Raw form only: the type of enterprise is not consulted here.
    assert_eq!(list.items[0].juridical_form_group, "Onbekend");
    assert_eq!(list.items[3].juridical_form_group, "014");
}

#[test]
fn list_matches_number_or_any_denomination_case_insensitively() {
    let connection = seeded_store();

    let by_name = list_enterprises(&connection, Some("flandre"), Pagination::sanitize(None, None))
        .expect("search should succeed");
    assert_eq!(by_name.total, 1);
    assert_eq!(by_name.items[0].enterprise_number, "0200.065.765");
    assert_eq!(
        by_name.items[0].names,
        vec!["IV", "Intercommunale Vlaanderen", "Intercommunale de Flandre"]
    );

    let by_number = list_enterprises(&connection, Some("0403"), Pagination::sanitize(None, None))
        .expect("search should succeed");
    assert_eq!(by_number.total, 1);
    assert_eq!(by_number.items[0].enterprise_number, "0403.170.701");

    let blank = list_enterprises(&connection, Some("   "), Pagination::sanitize(None, None))
        .expect("search should succeed");
    assert_eq!(blank.total, 4);
}

#[test]
fn list_pages_through_results_and_keeps_total() {
    let connection = seeded_store();

    let page = list_enterprises(&connection, None, Pagination::sanitize(Some("2"), Some("3")))
        .expect("listing should succeed");
    assert_eq!(page.total, 4);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].enterprise_number, "0200.065.765");

    let beyond = list_enterprises(&connection, None, Pagination::sanitize(Some("9"), Some("3")))
        .expect("listing should succeed");
    assert_eq!(beyond.total, 4);
    assert!(beyond.items.is_empty());
}

#[test]
fn detail_resolves_labels_in_requested_language() {
    let connection = seeded_store();

    let detail = enterprise_detail(&connection, "0200.065.765", Some("fr-BE"))
        .expect("detail should load");

    assert_eq!(detail.status_label.as_deref(), Some("Actif"));
    assert_eq!(
        detail.juridical_situation_label.as_deref(),
        Some("Situation normale")
    );
    assert_eq!(detail.type_of_enterprise_label.as_deref(), Some("Rechtspersoon"));
    assert_eq!(
        detail.juridical_form_label.as_deref(),
        Some("Société anonyme (SA)")
    );
    assert_eq!(detail.juridical_form_group, "014");
    assert_eq!(detail.juridical_form_display.as_deref(), Some("014"));

    let dutch = enterprise_detail(&connection, "0200.065.765", None).expect("detail should load");
    assert_eq!(dutch.juridical_form_group, "NV");
    assert_eq!(dutch.juridical_form_display.as_deref(), Some("NV"));
}

#[test]
fn detail_lists_children_in_stable_order() {
    let connection = seeded_store();

    let detail = enterprise_detail(&connection, "0200.065.765", Some("nl"))
        .expect("detail should load");

    let denominations = detail
        .denominations
        .iter()
        .map(|row| (row.language.as_str(), row.type_of_denomination.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(denominations, vec![("1", "001"), ("2", "001"), ("2", "002")]);

    assert_eq!(detail.addresses.len(), 1);
    assert_eq!(detail.addresses[0].box_number.as_deref(), Some("A"));
    assert_eq!(detail.contacts.len(), 1);
    assert_eq!(detail.contacts[0].value, "info@example.be");

    assert_eq!(detail.activities.len(), 3);
    assert_eq!(detail.activities[0].nace_version, 2025);
    assert_eq!(
        detail.activities[0].nace_label.as_deref(),
        Some("Computerprogrammering")
    );
    assert_eq!(
        detail.activities[1].nace_label.as_deref(),
        Some("Computerprogrammering")
    );
    assert_eq!(detail.activities[2].nace_code, "99999");
    assert_eq!(detail.activities[2].nace_label, None);
}

#[test]
fn detail_display_uses_natural_person_type_when_form_is_missing() {
    let connection = seeded_store();

    let detail = enterprise_detail(&connection, "0500.000.001", None).expect("detail should load");
    assert_eq!(detail.juridical_form, None);
    assert_eq!(detail.juridical_form_label, None);
    assert_eq!(detail.juridical_form_group, "Eenmanszaak");
    assert_eq!(detail.juridical_form_display.as_deref(), Some("Eenmanszaak"));

    let unlabeled =
        enterprise_detail(&connection, "0600.000.002", None).expect("detail should load");
    assert_eq!(unlabeled.juridical_form_group, "999");
    assert_eq!(unlabeled.juridical_form_display.as_deref(), Some("999"));
    assert_eq!(unlabeled.juridical_form_cac.as_deref(), Some("610"));
}

#[test]
fn detail_serializes_box_under_its_source_name() {
    let connection = seeded_store();

    let detail = enterprise_detail(&connection, "0200.065.765", None).expect("detail should load");
    let json = serde_json::to_value(&detail).expect("detail should serialize");

    assert_eq!(json["addresses"][0]["box"], "A");
    assert!(json["addresses"][0].get("box_number").is_none());
}

#[test]
fn detail_of_unknown_enterprise_is_not_found() {
    let connection = seeded_store();

    let err = enterprise_detail(&connection, "0123.456.789", None)
        .expect_err("unknown enterprise should fail");
    match err.downcast_ref::<RegistryError>() {
        Some(RegistryError::NotFound { enterprise_number }) => {
            assert_eq!(enterprise_number, "0123.456.789");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}
