use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime};

/// Current UTC time truncated to microseconds, the precision Postgres keeps.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    truncate_to_micros(PrimitiveDateTime::new(now.date(), now.time()))
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Returns `candidate`, or one microsecond past `previous` when the clock has
/// not moved beyond it. Keeps per-key timestamps strictly increasing.
pub(crate) fn strictly_after(
    candidate: PrimitiveDateTime,
    previous: Option<PrimitiveDateTime>,
) -> PrimitiveDateTime {
    match previous {
        Some(previous) if candidate <= previous => previous + Duration::microseconds(1),
        _ => candidate,
    }
}

fn truncate_to_micros(value: PrimitiveDateTime) -> PrimitiveDateTime {
    let nanos = value.nanosecond();
    value - Duration::nanoseconds(i64::from(nanos % 1_000))
}
