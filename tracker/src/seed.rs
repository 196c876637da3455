// Records written to a fresh local cache the first time it is opened.
use crate::types::{TrackingRecord, TrackingStep};

pub fn seed_records() -> Vec<TrackingRecord> {
    vec![
        TrackingRecord {
            code: "BR123456789".into(),
            status: "Em Trânsito".into(),
            current_location: Some("Rodovia Presidente Dutra, km 150".into()),
            origin: "São Paulo, SP".into(),
            destination: "Rio de Janeiro, RJ".into(),
            estimated_delivery: "05/02/2026".into(),
            steps: vec![
                TrackingStep::new("1", "Pedido Recebido", "São Paulo, SP - Centro de Distribuição")
                    .at("01/02/2026", "09:30")
                    .completed(),
                TrackingStep::new("2", "Em Separação", "São Paulo, SP - Centro de Distribuição")
                    .at("01/02/2026", "11:45")
                    .completed(),
                TrackingStep::new("3", "Coletado", "São Paulo, SP - Transportadora")
                    .at("02/02/2026", "08:00")
                    .completed(),
                TrackingStep::new("4", "Em Trânsito", "Rodovia Presidente Dutra, km 150")
                    .at("03/02/2026", "14:20")
                    .current(),
                TrackingStep::new("5", "Saiu para Entrega", "Rio de Janeiro, RJ"),
                TrackingStep::new("6", "Entregue", "Rio de Janeiro, RJ"),
            ],
        },
        TrackingRecord {
            code: "BR236472641200023".into(),
            status: "Postado".into(),
            current_location: Some("Distribuição lalamove".into()),
            origin: "Av. Rio das Pedras, 2920 - Jardim Aricanduva, São Paulo".into(),
            destination: "Rua Atilio Brum 33 Estrada Dos Caboclos - 23040-175".into(),
            estimated_delivery: "16/02/2026".into(),
            steps: vec![
                TrackingStep::new(
                    "1",
                    "Pedido Recebido",
                    "Av. Rio das Pedras, 2920 - Jardim Aricanduva, São Paulo",
                )
                .at("15/02/2026", "08:00")
                .completed(),
                TrackingStep::new(
                    "2",
                    "Postado",
                    "Av. Rio das Pedras, 2920 - Jardim Aricanduva, São Paulo",
                )
                .at("15/02/2026", "10:00")
                .completed(),
                TrackingStep::new(
                    "3",
                    "Distribuição lalamove",
                    "São Paulo, SP - Centro de Distribuição",
                )
                .current(),
                TrackingStep::new("4", "Saiu para Entrega", "Rio de Janeiro, RJ"),
                TrackingStep::new("5", "Entregue", "Rio de Janeiro, RJ"),
            ],
        },
    ]
}
