//! Types used throughout.
//!
//! > Schema defines the plain old data types that views operate on. Notably, the schema module has
//! > no knowledge of the database, nor any dependencies on any of the rest of the system.
//!
//! (The `Queryable` derives are the one concession: they only describe how a row maps onto a
//! struct, and the enum-valued columns are read as text and converted with `TryFrom<String>`.)

use chrono::NaiveDate;
use diesel::Queryable;
use serde_derive::Serialize;
use std::{error::Error, fmt};

/// An error from parsing one of the text-encoded enums below.
#[derive(Debug)]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Unknown {}: {:?}", self.kind, self.value)
    }
}

impl Error for UnknownVariant {}

string_enum! {
    /// A user's role. Roles are a closed set; every permission check matches on this
    /// exhaustively.
    pub enum Role {
        /// Registered, but not yet confirmed by an administrator. Can't do anything.
        Unverified => "unverified",
        /// A student.
        Student => "student",
        /// A teacher.
        Teacher => "teacher",
        /// A parent of one or more students.
        Parent => "parent",
        /// A school administrator.
        Admin => "admin",
        /// The principal.
        Principal => "principal",
        /// The principal's assistant.
        PrincipalAssistant => "principal_assistant",
        /// The school psychologist.
        SchoolPsychologist => "school_psychologist",
    }
}

impl Role {
    /// Whether this role belongs to the school's administration (admin, principal and the
    /// principal's assistant).
    pub fn is_admin_tier(self) -> bool {
        match self {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Unverified
            | Role::Student
            | Role::Teacher
            | Role::Parent
            | Role::SchoolPsychologist => false,
        }
    }
}

string_enum! {
    /// What happened with a student at a meeting.
    pub enum AbsenceType {
        /// Not yet recorded.
        Unknown => "UNKNOWN",
        /// The student was there.
        Present => "PRESENT",
        /// The student was absent.
        Absent => "ABSENT",
        /// The student came late.
        Late => "LATE",
    }
}

impl AbsenceType {
    /// Whether this is an actual absence, as opposed to an annotation.
    pub fn is_absence(self) -> bool {
        match self {
            AbsenceType::Absent | AbsenceType::Late => true,
            AbsenceType::Unknown | AbsenceType::Present => false,
        }
    }
}

string_enum! {
    /// A student's progress on a piece of homework.
    pub enum HomeworkStatus {
        /// Not yet checked.
        Unknown => "UNKNOWN",
        /// Done.
        Done => "DONE",
        /// Not done.
        NotDone => "NOT_DONE",
        /// Forgotten at home.
        Forgotten => "FORGOTTEN",
    }
}

string_enum! {
    /// The result of a self-test.
    pub enum TestingResult {
        /// Positive.
        Positive => "POSITIVE",
        /// Negative.
        Negative => "NEGATIVE",
        /// The student wasn't tested.
        NotTested => "NOT_TESTED",
    }
}

/// A user.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct User {
    /// The user's database ID.
    pub id: i32,

    /// The user's email address.
    pub email: String,

    /// The user's hashed password.
    #[serde(skip)]
    pub password: String,

    /// The user's role.
    #[diesel(deserialize_as = String)]
    pub role: Role,

    /// The user's name.
    pub name: String,

    /// The number on the user's birth certificate. Only administrators get to see it.
    pub birth_certificate_number: String,

    /// The user's birthday.
    pub birthday: Option<NaiveDate>,

    /// The city the user was born in.
    pub city_of_birth: String,

    /// The country the user was born in.
    pub country_of_birth: String,

    /// Whether the student is passing the year.
    pub is_passing: bool,
}

/// A class: a group of students with a teacher of record.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Class {
    /// The class's database ID.
    pub id: i32,

    /// The class's name, e.g. `"4.a"`.
    pub name: String,

    /// The ID of the class's teacher.
    pub teacher: i32,

    /// The school year, e.g. `"2021/2022"`.
    pub class_year: String,
}

/// A subject taught to a group of students.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Subject {
    /// The subject's database ID.
    pub id: i32,

    /// The ID of the teacher teaching the subject.
    pub teacher_id: i32,

    /// A short name, e.g. `"MAT"`.
    pub name: String,

    /// The full name, e.g. `"Mathematics"`.
    pub long_name: String,

    /// The class this subject is taught to, if any.
    pub class_id: Option<i32>,

    /// If true, the subject's students are the students of `class_id`.
    pub inherits_class: bool,

    /// How many lessons have been held so far.
    pub realization: f32,
}

/// A single scheduled lesson.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Meeting {
    /// The meeting's database ID.
    pub id: i32,

    /// A display name.
    pub meeting_name: String,

    /// The ID of the teacher holding the meeting.
    pub teacher_id: i32,

    /// The ID of the subject the meeting belongs to.
    pub subject_id: i32,

    /// The day of the meeting.
    pub date: NaiveDate,

    /// The school hour of the meeting.
    pub hour: i32,

    /// Whether attendance is mandatory.
    pub is_mandatory: bool,

    /// A link for online meetings.
    pub url: String,

    /// Free-form details.
    pub details: String,

    /// Whether someone other than the subject's teacher holds it.
    pub is_substitution: bool,

    /// Whether grades are given at the meeting.
    pub is_grading: bool,

    /// Whether the meeting is a written assessment.
    pub is_written_assessment: bool,

    /// Whether the meeting is a test.
    pub is_test: bool,
}

/// A record of a student's attendance at a meeting.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Absence {
    /// The absence's database ID.
    pub id: i32,

    /// The ID of the student.
    pub user_id: i32,

    /// The ID of the meeting.
    pub meeting_id: i32,

    /// The ID of the teacher who recorded it.
    pub teacher_id: i32,

    /// What happened.
    #[diesel(deserialize_as = String)]
    pub absence_type: AbsenceType,

    /// Whether the absence has been excused.
    pub is_excused: bool,
}

/// A grade.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Grade {
    /// The grade's database ID.
    pub id: i32,

    /// The ID of the graded student.
    pub user_id: i32,

    /// The ID of the teacher who gave it.
    pub teacher_id: i32,

    /// The ID of the subject it's in.
    pub subject_id: i32,

    /// The grade itself, from 1 to 5.
    pub grade: i32,

    /// Whether this was a written assessment.
    pub is_written: bool,

    /// The grading period, 1 or 2.
    pub period: i32,

    /// Whether this is the final grade for the subject.
    pub is_final: bool,

    /// The day it was given.
    pub date: NaiveDate,
}

/// A piece of homework given at a meeting.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Homework {
    /// The homework's database ID.
    pub id: i32,

    /// The ID of the teacher who gave it.
    pub teacher_id: i32,

    /// The ID of the subject it's for.
    pub subject_id: i32,

    /// The ID of the meeting it was given at.
    pub meeting_id: i32,

    /// A short title.
    pub name: String,

    /// What is to be done.
    pub description: String,

    /// The day it's due.
    pub to_date: NaiveDate,

    /// The day it was given.
    pub from_date: NaiveDate,
}

/// A self-testing record.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Testing {
    /// The record's database ID.
    pub id: i32,

    /// The ID of the tested student.
    pub user_id: i32,

    /// The ID of the teacher who recorded the result.
    pub teacher_id: i32,

    /// The ID of the class the student was tested with.
    pub class_id: i32,

    /// The day of the test.
    pub date: NaiveDate,

    /// How it came out.
    #[diesel(deserialize_as = String)]
    pub result: TestingResult,
}
