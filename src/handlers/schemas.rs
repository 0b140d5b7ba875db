//! Extraction schemas used by the handlers

use crate::language::{ExtractionSchema, FieldKind, FieldSpec};

const OFF_TOPIC: FieldSpec = FieldSpec::new(
    "off_topic",
    FieldKind::Boolean,
    "true nếu tin nhắn không liên quan tới việc tìm hoặc đặt vé máy bay",
);

const DEPARTURE_CITY: FieldSpec = FieldSpec::new(
    "departure_city",
    FieldKind::Text,
    "Thành phố hoặc sân bay điểm đi",
);
const DESTINATION_CITY: FieldSpec = FieldSpec::new(
    "destination_city",
    FieldKind::Text,
    "Thành phố hoặc sân bay điểm đến",
);
const DEPARTURE_DATE: FieldSpec = FieldSpec::new(
    "departure_date",
    FieldKind::Text,
    "Ngày đi, giữ nguyên cách nói của khách, ví dụ 'ngày mai', '25/12'",
);
const RETURN_DATE: FieldSpec = FieldSpec::new(
    "return_date",
    FieldKind::Text,
    "Ngày về nếu khách đặt khứ hồi",
);
const PASSENGER_COUNT: FieldSpec = FieldSpec::new(
    "passenger_count",
    FieldKind::Integer,
    "Tổng số hành khách",
);

pub const TRIP: ExtractionSchema = ExtractionSchema {
    name: "trip",
    description: "Thông tin chuyến bay khách hàng muốn tìm",
    fields: &[
        DEPARTURE_CITY,
        DESTINATION_CITY,
        DEPARTURE_DATE,
        RETURN_DATE,
        PASSENGER_COUNT,
        OFF_TOPIC,
    ],
};

pub const INTENT_BOOKING: &str = "booking";
pub const INTENT_CANCEL: &str = "cancel_booking";
pub const INTENT_GENERAL: &str = "general";

pub const INTENT: ExtractionSchema = ExtractionSchema {
    name: "intent",
    description: "Ý định chính của tin nhắn khách hàng",
    fields: &[FieldSpec::new(
        "intent",
        FieldKind::Choice(&[INTENT_BOOKING, INTENT_CANCEL, INTENT_GENERAL]),
        "booking: tìm hoặc đặt vé; cancel_booking: hủy vé đã đặt; general: mọi yêu cầu khác",
    )],
};

pub const SELECTION: ExtractionSchema = ExtractionSchema {
    name: "flight_selection",
    description: "Lựa chọn của khách trong danh sách chuyến bay",
    fields: &[
        FieldSpec::new(
            "option_number",
            FieldKind::Integer,
            "Số thứ tự chuyến bay khách chọn, bắt đầu từ 1",
        ),
        FieldSpec::new("flight_number", FieldKind::Text, "Số hiệu chuyến bay, ví dụ VN213"),
        DEPARTURE_CITY,
        DESTINATION_CITY,
        DEPARTURE_DATE,
        PASSENGER_COUNT,
        OFF_TOPIC,
    ],
};

pub const CONFIRMATION: ExtractionSchema = ExtractionSchema {
    name: "confirmation",
    description: "Khách đồng ý hay từ chối đề nghị vừa rồi",
    fields: &[
        FieldSpec::new("confirmed", FieldKind::Boolean, "true nếu khách đồng ý"),
        FieldSpec::new("declined", FieldKind::Boolean, "true nếu khách từ chối hoặc muốn đổi"),
        OFF_TOPIC,
    ],
};

const PASSENGER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("full_name", FieldKind::Text, "Họ và tên đầy đủ"),
    FieldSpec::new("date_of_birth", FieldKind::Text, "Ngày sinh, dạng ngày/tháng/năm"),
    FieldSpec::new("phone", FieldKind::Text, "Số điện thoại"),
];

pub const PASSENGERS: ExtractionSchema = ExtractionSchema {
    name: "passengers",
    description: "Thông tin hành khách có trong tin nhắn, theo thứ tự",
    fields: &[
        FieldSpec::new(
            "passengers",
            FieldKind::Records(PASSENGER_FIELDS),
            "Danh sách hành khách",
        ),
        OFF_TOPIC,
    ],
};

pub const PAYMENT: ExtractionSchema = ExtractionSchema {
    name: "payment",
    description: "Khách đã thanh toán hay chưa",
    fields: &[
        FieldSpec::new("paid", FieldKind::Boolean, "true nếu khách báo đã thanh toán"),
        OFF_TOPIC,
    ],
};

pub const CANCELLATION: ExtractionSchema = ExtractionSchema {
    name: "cancellation",
    description: "Yêu cầu hủy vé",
    fields: &[
        FieldSpec::new("booking_reference", FieldKind::Text, "Mã đặt chỗ (PNR)"),
        FieldSpec::new(
            "off_topic",
            FieldKind::Boolean,
            "true nếu tin nhắn không liên quan tới việc hủy vé",
        ),
    ],
};
