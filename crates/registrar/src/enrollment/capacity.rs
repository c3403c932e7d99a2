use super::domain::{Credits, EnrollmentRecord, Section, StudentId};

/// Records currently holding a seat in the section.
pub fn seats_taken<'a, I>(roster: I) -> u32
where
    I: IntoIterator<Item = &'a EnrollmentRecord>,
{
    let taken = roster
        .into_iter()
        .filter(|record| record.status.occupies_seat())
        .count();
    u32::try_from(taken).unwrap_or(u32::MAX)
}

/// `capacity - enrolling`, floored at zero.
pub fn remaining_seats<'a, I>(section: &Section, roster: I) -> u32
where
    I: IntoIterator<Item = &'a EnrollmentRecord>,
{
    section.capacity.saturating_sub(seats_taken(roster))
}

/// Seats left for `student`, ignoring a seat the student already holds so that a
/// repeated admission does not count against itself.
pub fn remaining_seats_for(
    section: &Section,
    roster: &[EnrollmentRecord],
    student: &StudentId,
) -> u32 {
    remaining_seats(
        section,
        roster.iter().filter(|record| &record.student != student),
    )
}

/// Current load plus the candidate course's weight.
pub fn projected_credit_load<I>(current: I, candidate: Credits) -> Credits
where
    I: IntoIterator<Item = Credits>,
{
    current.into_iter().sum::<Credits>() + candidate
}
