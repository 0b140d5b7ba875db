//! Rendering of offers, passengers and bookings for chat replies

use crate::normalize::city_name;
use crate::state::{FlightOffer, PassengerInfo};
use chrono::NaiveDateTime;

/// `1890000.0, "VND"` → `1.890.000 VND`
pub fn format_price(amount: f64, currency: &str) -> String {
    let rounded = amount.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{grouped} {currency}")
}

/// `2026-10-18T06:00:00` → `06:00 18/10/2026`
pub fn format_time(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|t| t.format("%H:%M %d/%m/%Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn clock(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// ISO-8601 duration (`PT2H10M`) → `2 giờ 10 phút`
pub fn format_duration(raw: &str) -> String {
    let Some(body) = raw.strip_prefix("PT") else {
        return raw.to_string();
    };
    let mut parts = Vec::new();
    let mut number = String::new();
    for ch in body.chars() {
        match ch {
            '0'..='9' => number.push(ch),
            'H' => parts.push(format!("{} giờ", std::mem::take(&mut number))),
            'M' => parts.push(format!("{} phút", std::mem::take(&mut number))),
            _ => return raw.to_string(),
        }
    }
    if parts.is_empty() || !number.is_empty() {
        return raw.to_string();
    }
    parts.join(" ")
}

fn place(code: &str) -> String {
    match city_name(code) {
        Some(city) => format!("{city} ({code})"),
        None => code.to_string(),
    }
}

fn stops_label(stops: u32) -> String {
    match stops {
        0 => "bay thẳng".to_string(),
        n => format!("{n} điểm dừng"),
    }
}

/// Numbered one-line summaries
pub fn format_offer_list(offers: &[FlightOffer]) -> String {
    offers
        .iter()
        .enumerate()
        .map(|(i, offer)| {
            format!(
                "{}. {} | {} → {} | {} | {}",
                i + 1,
                offer.flight_number,
                format_time(&offer.departure_time),
                clock(&offer.arrival_time),
                stops_label(offer.stops),
                format_price(offer.price, &offer.currency),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_offer_details(offer: &FlightOffer) -> String {
    let mut lines = vec![
        format!("Chuyến bay {} (hãng {})", offer.flight_number, offer.airline),
        format!(
            "- Khởi hành: {} lúc {}",
            place(&offer.departure_airport),
            format_time(&offer.departure_time)
        ),
        format!(
            "- Đến: {} lúc {}",
            place(&offer.arrival_airport),
            format_time(&offer.arrival_time)
        ),
    ];
    if let Some(duration) = &offer.duration {
        lines.push(format!("- Thời gian bay: {}", format_duration(duration)));
    }
    lines.push(format!("- Số điểm dừng: {}", stops_label(offer.stops)));
    lines.push(format!(
        "- Giá vé: {}",
        format_price(offer.price, &offer.currency)
    ));
    lines.join("\n")
}

pub fn format_passenger(position: usize, passenger: &PassengerInfo) -> String {
    format!(
        "{position}. {} ({}), sinh ngày {}, SĐT {}",
        passenger.full_name,
        passenger.passenger_type.label(),
        passenger.date_of_birth.format("%d/%m/%Y"),
        passenger.phone
    )
}

/// Everything the customer has to check before paying
pub fn format_booking_summary(flight: &FlightOffer, passengers: &[PassengerInfo]) -> String {
    let mut text = format!(
        "Dạ, em xin gửi lại toàn bộ thông tin đặt vé:\n{}\n\nHành khách:\n",
        format_offer_details(flight)
    );
    let listed: Vec<String> = passengers
        .iter()
        .enumerate()
        .map(|(i, p)| format_passenger(i + 1, p))
        .collect();
    text.push_str(&listed.join("\n"));
    text
}
