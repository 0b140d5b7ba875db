//! Fixed assistant texts and model instructions

use crate::state::{PassengerField, TripField};

/// Persona shared by every generated reply
pub const PERSONA: &str = "Bạn là Vivi, trợ lý ảo của FlyAgent chuyên hỗ trợ đặt vé máy bay.

Quy trình đặt vé gồm các bước, không được bỏ qua bước nào:
1. Thu thập điểm đi, điểm đến, ngày đi và số lượng hành khách, sau đó tìm chuyến bay.
2. Hiển thị tóm tắt các chuyến bay (giờ bay, hãng bay, giá) để khách chọn.
3. Khi khách chọn, hiển thị đầy đủ chi tiết chuyến bay và yêu cầu khách xác nhận.
4. Thu thập họ tên đầy đủ, ngày sinh và số điện thoại của từng hành khách.
5. Hiển thị lại toàn bộ thông tin đặt vé; khách phản hồi 'xác nhận' để nhận link thanh toán.
6. Khi khách phản hồi 'đã thanh toán', xuất vé và cung cấp mã đặt chỗ.

Giao tiếp:
- Gọi khách là anh/chị, xưng em. Không dùng 'tôi', 'mình'.
- Văn phong tự nhiên, thân thiện, ngắn gọn, rõ ý.
- Không bịa thông tin chuyến bay, giá vé hay mã đặt chỗ.";

/// Sentence a specialist uses to give the conversation back to the dispatcher
pub const HANDOFF: &str = "Về vấn đề này, em xin phép chuyển cho một chuyên viên khác.";

pub const GREETING: &str =
    "Xin chào! Tôi là FlyAgent, trợ lý đặt vé máy bay. Tôi có thể giúp gì cho bạn?";

pub const CLARIFY_INTENT: &str = "Dạ, anh/chị muốn đặt vé máy bay, hủy vé đã đặt hay cần em hỗ trợ thông tin khác ạ?";

pub const GENERAL_FALLBACK: &str = "Dạ, em có thể giúp gì khác cho anh/chị ạ?";

pub const ASK_BOOKING_REFERENCE: &str = "Dạ, để hủy vé, anh/chị vui lòng cung cấp mã đặt chỗ ạ.";

/// Reply of a turn that failed halfway
pub const APOLOGY: &str = "Dạ, em xin lỗi, hệ thống đang gặp sự cố nên em chưa xử lý được yêu cầu này. Anh/chị vui lòng thử lại sau ít phút ạ.";

/// Error text stored when a tool answered with something unreadable
pub const INVALID_TOOL_OUTPUT: &str = "Dữ liệu trả về từ tool không hợp lệ.";

pub const CHOOSE_FLIGHT: &str = "Anh/chị muốn chọn chuyến bay nào ạ? Anh/chị có thể trả lời số thứ tự hoặc số hiệu chuyến bay.";

pub const CONFIRM_FLIGHT: &str = "Anh/chị vui lòng xác nhận chuyến bay này để em tiếp tục nhập thông tin hành khách ạ.";

pub const REVIEW_QUESTION: &str = "Anh/chị vui lòng kiểm tra kỹ thông tin trên. Nếu chính xác, anh/chị phản hồi 'xác nhận' để em gửi link thanh toán ạ.";

pub const SEARCH_RETRY: &str = "Dạ, em chưa tìm thấy chuyến bay phù hợp. Anh/chị có muốn đổi ngày bay hoặc điểm đi, điểm đến không ạ?";

pub const SELECTION_INSTRUCTION: &str = "Khách hàng đang xem danh sách chuyến bay em vừa gửi. Trả lời ngắn gọn câu hỏi của khách dựa trên danh sách này và nhắc khách chọn một chuyến bay.";

pub const CONFIRMATION_INSTRUCTION: &str = "Khách hàng đang xem chi tiết chuyến bay đã chọn nhưng chưa xác nhận. Trả lời câu hỏi của khách và đề nghị khách xác nhận chuyến bay.";

pub const COMPLETED_INSTRUCTION: &str = "Vé của khách hàng đã được xuất. Trả lời các câu hỏi tiếp theo về chuyến bay đã đặt, ngắn gọn và chính xác.";

pub const GENERAL_INSTRUCTION: &str = "Trả lời câu hỏi chung của khách hàng về du lịch hàng không. Nếu khách muốn đặt hoặc hủy vé, mời khách nói rõ yêu cầu.";

fn join_labels(labels: Vec<&str>) -> String {
    labels.join(", ")
}

/// Deterministic prompt naming the trip fields still missing
pub fn ask_missing_trip_fields(missing: &[TripField]) -> String {
    format!(
        "Dạ, để tìm chuyến bay, anh/chị vui lòng cho em biết thêm về {} ạ.",
        join_labels(missing.iter().map(|f| f.label()).collect())
    )
}

pub fn ask_passenger(position: usize, total: u32) -> String {
    format!(
        "Dạ, anh/chị vui lòng cung cấp họ tên đầy đủ, ngày sinh và số điện thoại của hành khách thứ {position}/{total} ạ."
    )
}

pub fn ask_passenger_fields(missing: &[PassengerField], position: usize, total: u32) -> String {
    format!(
        "Dạ, em còn thiếu {} của hành khách thứ {position}/{total} ạ.",
        join_labels(missing.iter().map(|f| f.label()).collect())
    )
}

pub fn unknown_place(name: &str) -> String {
    format!("Dạ, em chưa tìm được sân bay nào cho \"{name}\". Anh/chị vui lòng cho em biết tên thành phố hoặc mã sân bay khác ạ.")
}

pub fn unreadable_date(text: &str) -> String {
    format!("Dạ, em chưa hiểu ngày \"{text}\". Anh/chị vui lòng nhập theo dạng ngày/tháng, ví dụ 25/12 ạ.")
}

pub const PAST_DATE: &str = "Dạ, ngày bay phải từ hôm nay trở đi ạ.";

pub const RETURN_BEFORE_DEPARTURE: &str = "Dạ, ngày về phải sau ngày đi ạ.";

pub const SAME_AIRPORT: &str = "Dạ, điểm đi và điểm đến không được trùng nhau ạ.";

pub fn passenger_count_out_of_range(max: u32) -> String {
    format!("Dạ, mỗi lần đặt em chỉ hỗ trợ từ 1 đến {max} hành khách ạ.")
}

pub fn invalid_option(count: usize) -> String {
    format!("Dạ, anh/chị vui lòng chọn một số từ 1 đến {count} ạ.")
}

pub fn invalid_birth_date(text: &str) -> String {
    format!("Dạ, ngày sinh \"{text}\" chưa hợp lệ. Anh/chị vui lòng nhập theo dạng ngày/tháng/năm ạ.")
}

pub fn invalid_phone(text: &str) -> String {
    format!("Dạ, số điện thoại \"{text}\" chưa hợp lệ ạ.")
}

pub fn payment_requested(booking_id: &str, link: &str) -> String {
    format!(
        "Dạ, em đã giữ chỗ thành công với mã đặt chỗ {booking_id}. Anh/chị vui lòng thanh toán qua đường link sau: {link}\nSau khi thanh toán xong, anh/chị phản hồi 'đã thanh toán' để em xuất vé ạ."
    )
}

pub fn payment_reminder(link: &str) -> String {
    format!(
        "Dạ, đơn đặt vé đang chờ thanh toán. Anh/chị vui lòng thanh toán qua link {link} rồi phản hồi 'đã thanh toán' giúp em ạ."
    )
}

pub fn ticket_issued(booking_id: &str) -> String {
    format!(
        "Dạ, em đã xuất vé thành công! Mã đặt chỗ của anh/chị là {booking_id}. Chúc anh/chị có chuyến bay vui vẻ ạ."
    )
}

pub fn booking_failed(error: &str) -> String {
    format!("Dạ, em chưa đặt được vé: {error}. Anh/chị vui lòng thử lại giúp em ạ.")
}

pub fn cancelled(booking_id: &str) -> String {
    format!("Dạ, vé với mã đặt chỗ {booking_id} đã được hủy thành công ạ.")
}

pub fn cancel_failed(error: &str) -> String {
    format!("Dạ, em chưa hủy được vé: {error}. Anh/chị vui lòng kiểm tra lại mã đặt chỗ ạ.")
}
