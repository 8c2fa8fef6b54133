//! Built-in sample companies for seeding an empty registry.

use crate::error::Result;
use crate::types::NewCompany;

const SAMPLE_COMPANIES: &str = r#"[
    {
        "companyName": "ООО \"Вектор\"",
        "directorFullName": "Иванов И.И.",
        "phoneNumber": "+7 000 123 45 67",
        "address": { "city": "Москва", "street": "ул. Ленина", "house": "1" }
    },
    {
        "companyName": "ИП Сидоров С.С.",
        "directorFullName": "Сидоров С.С.",
        "phoneNumber": "+7 000 56 78 99",
        "address": { "city": "Санкт-Петербург", "street": "пр. Невский", "house": "2" }
    },
    {
        "companyName": "АО \"Технологии Будущего\"",
        "directorFullName": "Петров П.П.",
        "phoneNumber": "+7 111 222 33 44",
        "address": { "city": "Екатеринбург", "street": "пр. Ленина", "house": "15" }
    }
]"#;

/// The sample companies, in insertion order.
pub fn sample_companies() -> Result<Vec<NewCompany>> {
    Ok(serde_json::from_str(SAMPLE_COMPANIES)?)
}
