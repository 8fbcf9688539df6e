//! Bindings to the database.
//!
//! > **DAL**, for lack of a better term (borrowing this one from "data access layer" since I don't
//! > want to use "model"), is the only module that does any talking to the database, or any other
//! > IO or interaction with other kinds of externalized state for that matter.
//!
//! Memberships (class students, subject students, a parent's children) live in join tables keyed
//! by both IDs, and every write happens inside an immediate transaction, so two concurrent adds
//! can't both pass the duplicate check.

#[allow(proc_macro_derive_resolution_fallback, unused_import_braces)]
mod schema;

use crate::{
    dal::schema::{
        absences, class_students, classes, grades, homework, meetings, parent_children,
        student_homework, subject_students, subjects, testing, users,
    },
    schema::{
        Absence, AbsenceType, Class, Grade, Homework, HomeworkStatus, Meeting, Role, Subject,
        Testing, TestingResult, User,
    },
    util::blocking,
};
use chrono::NaiveDate;
use diesel::{
    connection::SimpleConnection,
    delete,
    dsl::{exists, max},
    insert_into,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
    select, update,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use failure::{format_err, Fallible};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Assigns the next ID for a table, as one more than the largest existing one. Only sound inside
/// a write transaction.
macro_rules! next_id {
    ($conn:expr, $table:ident) => {
        $table::table
            .select(max($table::id))
            .first::<Option<i32>>($conn)
            .map(|id| id.map_or(1, |id| id + 1))
    };
}

/// A pool of connections to the database.
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct DB {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl DB {
    /// Connects to the database with at the given URL (a path to a SQLite database).
    pub fn connect(database_url: &str) -> Fallible<DB> {
        let pool = Pool::builder()
            .connection_customizer(Box::new(Pragmas))
            .build(ConnectionManager::new(database_url))?;
        DB::migrate(pool)
    }

    /// Creates a fresh database that lives in memory. The pool only holds a single connection,
    /// since every SQLite connection to `:memory:` opens its own database.
    pub fn in_memory() -> Fallible<DB> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(Pragmas))
            .build(ConnectionManager::new(":memory:"))?;
        DB::migrate(pool)
    }

    fn migrate(pool: Pool<ConnectionManager<SqliteConnection>>) -> Fallible<DB> {
        let mut conn = pool.get()?;
        let _ = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| format_err!("Couldn't run migrations: {}", err))?;
        Ok(DB {
            pool: Arc::new(pool),
        })
    }

    // Users

    /// Creates a user, unless the email is already taken. The first user ever created becomes an
    /// admin; everybody after that starts out unverified.
    pub async fn create_user(
        &self,
        email: String,
        password: String,
        name: String,
    ) -> Fallible<Option<User>> {
        self.write(move |conn| {
            let taken = select(exists(users::table.filter(users::email.eq(&email))))
                .get_result::<bool>(conn)?;
            if taken {
                return Ok(None);
            }

            let has_admin = select(exists(
                users::table.filter(users::role.eq(Role::Admin.as_str())),
            ))
            .get_result::<bool>(conn)?;
            let role = if has_admin {
                Role::Unverified
            } else {
                Role::Admin
            };

            let id = next_id!(conn, users)?;
            let _ = insert_into(users::table)
                .values((
                    users::id.eq(id),
                    users::email.eq(&email),
                    users::password.eq(&password),
                    users::role.eq(role.as_str()),
                    users::name.eq(&name),
                ))
                .execute(conn)?;
            Ok(Some(users::table.find(id).first(conn)?))
        })
        .await
    }

    /// Gets a user by ID.
    pub async fn get_user(&self, user: i32) -> Fallible<Option<User>> {
        self.query(move |conn| Ok(users::table.find(user).first(conn).optional()?))
            .await
    }

    /// Gets a user by email.
    pub async fn get_user_by_email(&self, email: String) -> Fallible<Option<User>> {
        self.query(move |conn| {
            Ok(users::table
                .filter(users::email.eq(&email))
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Gets every user.
    pub async fn get_users(&self) -> Fallible<Vec<User>> {
        self.query(|conn| Ok(users::table.order(users::id.asc()).load(conn)?))
            .await
    }

    /// Gets every user with the given role.
    pub async fn get_users_with_role(&self, role: Role) -> Fallible<Vec<User>> {
        self.query(move |conn| {
            Ok(users::table
                .filter(users::role.eq(role.as_str()))
                .order(users::id.asc())
                .load(conn)?)
        })
        .await
    }

    /// Gets the principal, if one has been appointed.
    pub async fn get_principal(&self) -> Fallible<Option<User>> {
        self.query(|conn| {
            Ok(users::table
                .filter(users::role.eq(Role::Principal.as_str()))
                .order(users::id.asc())
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Overwrites a user's profile. The role and password are left alone.
    pub async fn update_user(&self, user: User) -> Fallible<()> {
        self.write(move |conn| {
            let _ = update(users::table.find(user.id))
                .set((
                    users::email.eq(&user.email),
                    users::name.eq(&user.name),
                    users::birth_certificate_number.eq(&user.birth_certificate_number),
                    users::birthday.eq(user.birthday),
                    users::city_of_birth.eq(&user.city_of_birth),
                    users::country_of_birth.eq(&user.country_of_birth),
                    users::is_passing.eq(user.is_passing),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Changes a user's role, returning whether the user exists.
    pub async fn set_role(&self, user: i32, role: Role) -> Fallible<bool> {
        self.write(move |conn| {
            let n = update(users::table.find(user))
                .set(users::role.eq(role.as_str()))
                .execute(conn)?;
            Ok(n > 0)
        })
        .await
    }

    /// Deletes a user, along with their memberships and their own records.
    pub async fn delete_user(&self, user: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(users::table.find(user)).execute(conn)?;
            let _ = delete(class_students::table.filter(class_students::student_id.eq(user)))
                .execute(conn)?;
            let _ = delete(subject_students::table.filter(subject_students::student_id.eq(user)))
                .execute(conn)?;
            let _ = delete(
                parent_children::table.filter(
                    parent_children::parent_id
                        .eq(user)
                        .or(parent_children::child_id.eq(user)),
                ),
            )
            .execute(conn)?;
            let _ = delete(absences::table.filter(absences::user_id.eq(user))).execute(conn)?;
            let _ = delete(grades::table.filter(grades::user_id.eq(user))).execute(conn)?;
            let _ = delete(student_homework::table.filter(student_homework::user_id.eq(user)))
                .execute(conn)?;
            let _ = delete(testing::table.filter(testing::user_id.eq(user))).execute(conn)?;
            Ok(())
        })
        .await
    }

    // Parents

    /// Gets the IDs of a parent's children.
    pub async fn get_children(&self, parent: i32) -> Fallible<BTreeSet<i32>> {
        self.query(move |conn| {
            let children = parent_children::table
                .filter(parent_children::parent_id.eq(parent))
                .select(parent_children::child_id)
                .load::<i32>(conn)?;
            Ok(children.into_iter().collect())
        })
        .await
    }

    /// Links a child to a parent, returning false if they were already linked.
    pub async fn add_child(&self, parent: i32, child: i32) -> Fallible<bool> {
        self.write(move |conn| {
            let linked = select(exists(parent_children::table.find((parent, child))))
                .get_result::<bool>(conn)?;
            if linked {
                return Ok(false);
            }
            let _ = insert_into(parent_children::table)
                .values((
                    parent_children::parent_id.eq(parent),
                    parent_children::child_id.eq(child),
                ))
                .execute(conn)?;
            Ok(true)
        })
        .await
    }

    /// Unlinks a child from a parent. Unlinking a child that isn't linked does nothing.
    pub async fn remove_child(&self, parent: i32, child: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(parent_children::table.find((parent, child))).execute(conn)?;
            Ok(())
        })
        .await
    }

    // Classes

    /// Creates a class, returning its ID.
    pub async fn create_class(
        &self,
        name: String,
        teacher: i32,
        class_year: String,
    ) -> Fallible<i32> {
        self.write(move |conn| {
            let id = next_id!(conn, classes)?;
            let _ = insert_into(classes::table)
                .values((
                    classes::id.eq(id),
                    classes::name.eq(&name),
                    classes::teacher_id.eq(teacher),
                    classes::class_year.eq(&class_year),
                ))
                .execute(conn)?;
            Ok(id)
        })
        .await
    }

    /// Gets a class by ID.
    pub async fn get_class(&self, class: i32) -> Fallible<Option<Class>> {
        self.query(move |conn| Ok(classes::table.find(class).first(conn).optional()?))
            .await
    }

    /// Gets every class, along with its students.
    pub async fn get_classes(&self) -> Fallible<Vec<(Class, BTreeSet<i32>)>> {
        self.query(|conn| {
            let all = classes::table
                .order(classes::id.asc())
                .load::<Class>(conn)?;
            let mut rosters = BTreeMap::<i32, BTreeSet<i32>>::new();
            for (class, student) in class_students::table.load::<(i32, i32)>(conn)? {
                let _ = rosters.entry(class).or_default().insert(student);
            }
            Ok(all
                .into_iter()
                .map(|class| {
                    let roster = rosters.remove(&class.id).unwrap_or_default();
                    (class, roster)
                })
                .collect())
        })
        .await
    }

    /// Gets the IDs of a class's students.
    pub async fn get_class_students(&self, class: i32) -> Fallible<BTreeSet<i32>> {
        self.query(move |conn| Ok(class_roster(conn, class)?)).await
    }

    /// Adds a student to a class, returning false if they were already in it.
    pub async fn add_class_student(&self, class: i32, student: i32) -> Fallible<bool> {
        self.write(move |conn| {
            let member = select(exists(class_students::table.find((class, student))))
                .get_result::<bool>(conn)?;
            if member {
                return Ok(false);
            }
            let _ = insert_into(class_students::table)
                .values((
                    class_students::class_id.eq(class),
                    class_students::student_id.eq(student),
                ))
                .execute(conn)?;
            Ok(true)
        })
        .await
    }

    /// Removes a student from a class. Removing a student that isn't in the class does nothing.
    pub async fn remove_class_student(&self, class: i32, student: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(class_students::table.find((class, student))).execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Deletes a class and its memberships. Subjects that inherited the class are left with an
    /// empty roster.
    pub async fn delete_class(&self, class: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(classes::table.find(class)).execute(conn)?;
            let _ = delete(class_students::table.filter(class_students::class_id.eq(class)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    // Subjects

    /// Creates a subject, returning its ID. If a class is given, the subject inherits its
    /// students from it.
    pub async fn create_subject(
        &self,
        teacher: i32,
        name: String,
        long_name: String,
        class: Option<i32>,
    ) -> Fallible<i32> {
        self.write(move |conn| {
            let id = next_id!(conn, subjects)?;
            let _ = insert_into(subjects::table)
                .values((
                    subjects::id.eq(id),
                    subjects::teacher_id.eq(teacher),
                    subjects::name.eq(&name),
                    subjects::long_name.eq(&long_name),
                    subjects::class_id.eq(class),
                    subjects::inherits_class.eq(class.is_some()),
                    subjects::realization.eq(0.0f32),
                ))
                .execute(conn)?;
            Ok(id)
        })
        .await
    }

    /// Gets a subject by ID.
    pub async fn get_subject(&self, subject: i32) -> Fallible<Option<Subject>> {
        self.query(move |conn| Ok(subjects::table.find(subject).first(conn).optional()?))
            .await
    }

    /// Gets every subject, along with its current students.
    pub async fn get_subjects(&self) -> Fallible<Vec<(Subject, BTreeSet<i32>)>> {
        self.query(|conn| {
            let all = subjects::table
                .order(subjects::id.asc())
                .load::<Subject>(conn)?;
            all.into_iter()
                .map(|subject| -> Fallible<_> {
                    let roster = subject_roster(conn, &subject)?;
                    Ok((subject, roster))
                })
                .collect()
        })
        .await
    }

    /// Gets a subject along with the IDs of its current students. For a subject that inherits a
    /// class, those are read from the class every time.
    pub async fn get_subject_with_students(
        &self,
        subject: i32,
    ) -> Fallible<Option<(Subject, BTreeSet<i32>)>> {
        self.query(move |conn| {
            let subject = match subjects::table.find(subject).first(conn).optional()? {
                Some(subject) => subject,
                None => return Ok(None),
            };
            let roster = subject_roster(conn, &subject)?;
            Ok(Some((subject, roster)))
        })
        .await
    }

    /// Adds a student to a subject's own roster, returning false if they were already on it.
    pub async fn add_subject_student(&self, subject: i32, student: i32) -> Fallible<bool> {
        self.write(move |conn| {
            let member = select(exists(subject_students::table.find((subject, student))))
                .get_result::<bool>(conn)?;
            if member {
                return Ok(false);
            }
            let _ = insert_into(subject_students::table)
                .values((
                    subject_students::subject_id.eq(subject),
                    subject_students::student_id.eq(student),
                ))
                .execute(conn)?;
            Ok(true)
        })
        .await
    }

    /// Removes a student from a subject's own roster. Removing a non-member does nothing.
    pub async fn remove_subject_student(&self, subject: i32, student: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(subject_students::table.find((subject, student))).execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Deletes a subject, along with its meetings and everything recorded at them.
    pub async fn delete_subject(&self, subject: i32) -> Fallible<()> {
        self.write(move |conn| {
            let meeting_ids = meetings::table
                .filter(meetings::subject_id.eq(subject))
                .select(meetings::id)
                .load::<i32>(conn)?;
            for meeting in meeting_ids {
                delete_meeting_records(conn, meeting)?;
            }
            let _ = delete(meetings::table.filter(meetings::subject_id.eq(subject)))
                .execute(conn)?;
            let _ = delete(grades::table.filter(grades::subject_id.eq(subject))).execute(conn)?;
            let _ = delete(subject_students::table.filter(subject_students::subject_id.eq(subject)))
                .execute(conn)?;
            let _ = delete(subjects::table.find(subject)).execute(conn)?;
            Ok(())
        })
        .await
    }

    // Meetings

    /// Creates a meeting, returning its ID. The ID on the passed meeting is ignored.
    pub async fn create_meeting(&self, meeting: Meeting) -> Fallible<i32> {
        self.write(move |conn| {
            let id = next_id!(conn, meetings)?;
            let _ = insert_into(meetings::table)
                .values((
                    meetings::id.eq(id),
                    meetings::meeting_name.eq(&meeting.meeting_name),
                    meetings::teacher_id.eq(meeting.teacher_id),
                    meetings::subject_id.eq(meeting.subject_id),
                    meetings::date.eq(meeting.date),
                    meetings::hour.eq(meeting.hour),
                    meetings::is_mandatory.eq(meeting.is_mandatory),
                    meetings::url.eq(&meeting.url),
                    meetings::details.eq(&meeting.details),
                    meetings::is_substitution.eq(meeting.is_substitution),
                    meetings::is_grading.eq(meeting.is_grading),
                    meetings::is_written_assessment.eq(meeting.is_written_assessment),
                    meetings::is_test.eq(meeting.is_test),
                ))
                .execute(conn)?;
            update_realization(conn, meeting.subject_id)?;
            Ok(id)
        })
        .await
    }

    /// Gets a meeting by ID.
    pub async fn get_meeting(&self, meeting: i32) -> Fallible<Option<Meeting>> {
        self.query(move |conn| Ok(meetings::table.find(meeting).first(conn).optional()?))
            .await
    }

    /// Gets every meeting between two dates (inclusive), in timetable order.
    pub async fn get_meetings_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Fallible<Vec<Meeting>> {
        self.query(move |conn| {
            Ok(meetings::table
                .filter(meetings::date.between(start, end))
                .order((meetings::date.asc(), meetings::hour.asc(), meetings::id.asc()))
                .load(conn)?)
        })
        .await
    }

    /// Overwrites a meeting.
    pub async fn update_meeting(&self, meeting: Meeting) -> Fallible<()> {
        self.write(move |conn| {
            let _ = update(meetings::table.find(meeting.id))
                .set((
                    meetings::meeting_name.eq(&meeting.meeting_name),
                    meetings::teacher_id.eq(meeting.teacher_id),
                    meetings::date.eq(meeting.date),
                    meetings::hour.eq(meeting.hour),
                    meetings::is_mandatory.eq(meeting.is_mandatory),
                    meetings::url.eq(&meeting.url),
                    meetings::details.eq(&meeting.details),
                    meetings::is_substitution.eq(meeting.is_substitution),
                    meetings::is_grading.eq(meeting.is_grading),
                    meetings::is_written_assessment.eq(meeting.is_written_assessment),
                    meetings::is_test.eq(meeting.is_test),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Deletes a meeting, along with its absences and homework.
    pub async fn delete_meeting(&self, meeting: i32) -> Fallible<()> {
        self.write(move |conn| {
            let subject = meetings::table
                .find(meeting)
                .select(meetings::subject_id)
                .first::<i32>(conn)
                .optional()?;
            delete_meeting_records(conn, meeting)?;
            let _ = delete(meetings::table.find(meeting)).execute(conn)?;
            if let Some(subject) = subject {
                update_realization(conn, subject)?;
            }
            Ok(())
        })
        .await
    }

    // Absences

    /// Gets every absence record of a user.
    pub async fn get_absences_for_user(&self, user: i32) -> Fallible<Vec<Absence>> {
        self.query(move |conn| {
            Ok(absences::table
                .filter(absences::user_id.eq(user))
                .order(absences::id.asc())
                .load(conn)?)
        })
        .await
    }

    /// Gets every absence record of a meeting.
    pub async fn get_absences_for_meeting(&self, meeting: i32) -> Fallible<Vec<Absence>> {
        self.query(move |conn| {
            Ok(absences::table
                .filter(absences::meeting_id.eq(meeting))
                .order(absences::id.asc())
                .load(conn)?)
        })
        .await
    }

    /// Records what happened with a student at a meeting, replacing any earlier record.
    pub async fn set_absence(
        &self,
        meeting: i32,
        user: i32,
        teacher: i32,
        absence_type: AbsenceType,
        is_excused: bool,
    ) -> Fallible<Absence> {
        self.write(move |conn| {
            let existing = absences::table
                .filter(absences::meeting_id.eq(meeting))
                .filter(absences::user_id.eq(user))
                .select(absences::id)
                .first::<i32>(conn)
                .optional()?;
            let id = match existing {
                Some(id) => {
                    let _ = update(absences::table.find(id))
                        .set((
                            absences::teacher_id.eq(teacher),
                            absences::absence_type.eq(absence_type.as_str()),
                            absences::is_excused.eq(is_excused),
                        ))
                        .execute(conn)?;
                    id
                }
                None => {
                    let id = next_id!(conn, absences)?;
                    let _ = insert_into(absences::table)
                        .values((
                            absences::id.eq(id),
                            absences::user_id.eq(user),
                            absences::meeting_id.eq(meeting),
                            absences::teacher_id.eq(teacher),
                            absences::absence_type.eq(absence_type.as_str()),
                            absences::is_excused.eq(is_excused),
                        ))
                        .execute(conn)?;
                    id
                }
            };
            Ok(absences::table.find(id).first(conn)?)
        })
        .await
    }

    // Grades

    /// Creates a grade, returning its ID. The ID on the passed grade is ignored.
    pub async fn create_grade(&self, grade: Grade) -> Fallible<i32> {
        self.write(move |conn| {
            let id = next_id!(conn, grades)?;
            let _ = insert_into(grades::table)
                .values((
                    grades::id.eq(id),
                    grades::user_id.eq(grade.user_id),
                    grades::teacher_id.eq(grade.teacher_id),
                    grades::subject_id.eq(grade.subject_id),
                    grades::grade.eq(grade.grade),
                    grades::is_written.eq(grade.is_written),
                    grades::period.eq(grade.period),
                    grades::is_final.eq(grade.is_final),
                    grades::date.eq(grade.date),
                ))
                .execute(conn)?;
            Ok(id)
        })
        .await
    }

    /// Gets a grade by ID.
    pub async fn get_grade(&self, grade: i32) -> Fallible<Option<Grade>> {
        self.query(move |conn| Ok(grades::table.find(grade).first(conn).optional()?))
            .await
    }

    /// Gets every grade given in a subject.
    pub async fn get_grades_for_subject(&self, subject: i32) -> Fallible<Vec<Grade>> {
        self.query(move |conn| {
            Ok(grades::table
                .filter(grades::subject_id.eq(subject))
                .order(grades::id.asc())
                .load(conn)?)
        })
        .await
    }

    /// Gets every grade a user got.
    pub async fn get_grades_for_user(&self, user: i32) -> Fallible<Vec<Grade>> {
        self.query(move |conn| {
            Ok(grades::table
                .filter(grades::user_id.eq(user))
                .order((grades::subject_id.asc(), grades::id.asc()))
                .load(conn)?)
        })
        .await
    }

    /// Changes a grade.
    pub async fn update_grade(&self, grade: Grade) -> Fallible<()> {
        self.write(move |conn| {
            let _ = update(grades::table.find(grade.id))
                .set((
                    grades::grade.eq(grade.grade),
                    grades::is_written.eq(grade.is_written),
                    grades::period.eq(grade.period),
                    grades::is_final.eq(grade.is_final),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Deletes a grade.
    pub async fn delete_grade(&self, grade: i32) -> Fallible<()> {
        self.write(move |conn| {
            let _ = delete(grades::table.find(grade)).execute(conn)?;
            Ok(())
        })
        .await
    }

    // Homework

    /// Creates a piece of homework, returning its ID. The ID on the passed homework is ignored.
    pub async fn create_homework(&self, hw: Homework) -> Fallible<i32> {
        self.write(move |conn| {
            let id = next_id!(conn, homework)?;
            let _ = insert_into(homework::table)
                .values((
                    homework::id.eq(id),
                    homework::teacher_id.eq(hw.teacher_id),
                    homework::subject_id.eq(hw.subject_id),
                    homework::meeting_id.eq(hw.meeting_id),
                    homework::name.eq(&hw.name),
                    homework::description.eq(&hw.description),
                    homework::to_date.eq(hw.to_date),
                    homework::from_date.eq(hw.from_date),
                ))
                .execute(conn)?;
            Ok(id)
        })
        .await
    }

    /// Gets a piece of homework by ID.
    pub async fn get_homework(&self, hw: i32) -> Fallible<Option<Homework>> {
        self.query(move |conn| Ok(homework::table.find(hw).first(conn).optional()?))
            .await
    }

    /// Gets every piece of homework given in a subject, along with the recorded statuses of each
    /// student.
    pub async fn get_homework_for_subject(
        &self,
        subject: i32,
    ) -> Fallible<Vec<(Homework, BTreeMap<i32, HomeworkStatus>)>> {
        self.query(move |conn| {
            let all = homework::table
                .filter(homework::subject_id.eq(subject))
                .order((homework::to_date.asc(), homework::id.asc()))
                .load::<Homework>(conn)?;
            let ids = all.iter().map(|hw| hw.id).collect::<Vec<_>>();
            let mut statuses = BTreeMap::<i32, BTreeMap<i32, HomeworkStatus>>::new();
            let rows = student_homework::table
                .filter(student_homework::homework_id.eq_any(ids))
                .load::<(i32, i32, String)>(conn)?;
            for (hw, user, status) in rows {
                let _ = statuses
                    .entry(hw)
                    .or_default()
                    .insert(user, status.parse()?);
            }
            Ok(all
                .into_iter()
                .map(|hw| {
                    let status = statuses.remove(&hw.id).unwrap_or_default();
                    (hw, status)
                })
                .collect())
        })
        .await
    }

    /// Records a student's progress on a piece of homework.
    pub async fn set_homework_status(
        &self,
        hw: i32,
        user: i32,
        status: HomeworkStatus,
    ) -> Fallible<()> {
        self.write(move |conn| {
            let recorded = select(exists(student_homework::table.find((hw, user))))
                .get_result::<bool>(conn)?;
            let _ = if recorded {
                update(student_homework::table.find((hw, user)))
                    .set(student_homework::status.eq(status.as_str()))
                    .execute(conn)?
            } else {
                insert_into(student_homework::table)
                    .values((
                        student_homework::homework_id.eq(hw),
                        student_homework::user_id.eq(user),
                        student_homework::status.eq(status.as_str()),
                    ))
                    .execute(conn)?
            };
            Ok(())
        })
        .await
    }

    // Self-testing

    /// Gets the self-testing results of a class on a day.
    pub async fn get_testing_for_class(
        &self,
        class: i32,
        date: NaiveDate,
    ) -> Fallible<Vec<Testing>> {
        self.query(move |conn| {
            Ok(testing::table
                .filter(testing::class_id.eq(class))
                .filter(testing::date.eq(date))
                .order(testing::id.asc())
                .load(conn)?)
        })
        .await
    }

    /// Gets a self-testing record by ID.
    pub async fn get_testing_record(&self, id: i32) -> Fallible<Option<Testing>> {
        self.query(move |conn| Ok(testing::table.find(id).first(conn).optional()?))
            .await
    }

    /// Gets a user's self-testing result on a day.
    pub async fn get_testing(&self, user: i32, date: NaiveDate) -> Fallible<Option<Testing>> {
        self.query(move |conn| {
            Ok(testing::table
                .filter(testing::user_id.eq(user))
                .filter(testing::date.eq(date))
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Records a user's self-testing result on a day, replacing any earlier one.
    pub async fn set_testing(
        &self,
        user: i32,
        teacher: i32,
        class: i32,
        date: NaiveDate,
        result: TestingResult,
    ) -> Fallible<Testing> {
        self.write(move |conn| {
            let existing = testing::table
                .filter(testing::user_id.eq(user))
                .filter(testing::date.eq(date))
                .select(testing::id)
                .first::<i32>(conn)
                .optional()?;
            let id = match existing {
                Some(id) => {
                    let _ = update(testing::table.find(id))
                        .set((
                            testing::teacher_id.eq(teacher),
                            testing::class_id.eq(class),
                            testing::result.eq(result.as_str()),
                        ))
                        .execute(conn)?;
                    id
                }
                None => {
                    let id = next_id!(conn, testing)?;
                    let _ = insert_into(testing::table)
                        .values((
                            testing::id.eq(id),
                            testing::user_id.eq(user),
                            testing::teacher_id.eq(teacher),
                            testing::class_id.eq(class),
                            testing::date.eq(date),
                            testing::result.eq(result.as_str()),
                        ))
                        .execute(conn)?;
                    id
                }
            };
            Ok(testing::table.find(id).first(conn)?)
        })
        .await
    }

    /// Performs a query on the blocking thread pool. Diesel is synchronous, and so is SQLite.
    async fn query<F, T>(&self, func: F) -> Fallible<T>
    where
        F: 'static + FnOnce(&mut SqliteConnection) -> Fallible<T> + Send,
        T: 'static + Send,
    {
        let pool = self.pool.clone();
        blocking(move || {
            let mut conn = pool.get()?;
            func(&mut conn)
        })
        .await
    }

    /// Performs a query inside an immediate transaction, which takes the database's write lock
    /// up front.
    async fn write<F, T>(&self, func: F) -> Fallible<T>
    where
        F: 'static + FnOnce(&mut SqliteConnection) -> Fallible<T> + Send,
        T: 'static + Send,
    {
        self.query(move |conn| conn.immediate_transaction(func))
            .await
    }
}

fn class_roster(conn: &mut SqliteConnection, class: i32) -> QueryResult<BTreeSet<i32>> {
    let students = class_students::table
        .filter(class_students::class_id.eq(class))
        .select(class_students::student_id)
        .load::<i32>(conn)?;
    Ok(students.into_iter().collect())
}

fn subject_roster(conn: &mut SqliteConnection, subject: &Subject) -> QueryResult<BTreeSet<i32>> {
    match (subject.inherits_class, subject.class_id) {
        (true, Some(class)) => class_roster(conn, class),
        (true, None) => Ok(BTreeSet::new()),
        (false, _) => {
            let students = subject_students::table
                .filter(subject_students::subject_id.eq(subject.id))
                .select(subject_students::student_id)
                .load::<i32>(conn)?;
            Ok(students.into_iter().collect())
        }
    }
}

fn update_realization(conn: &mut SqliteConnection, subject: i32) -> QueryResult<()> {
    let held = meetings::table
        .filter(meetings::subject_id.eq(subject))
        .count()
        .get_result::<i64>(conn)?;
    let _ = update(subjects::table.find(subject))
        .set(subjects::realization.eq(held as f32))
        .execute(conn)?;
    Ok(())
}

fn delete_meeting_records(conn: &mut SqliteConnection, meeting: i32) -> QueryResult<()> {
    let _ = delete(absences::table.filter(absences::meeting_id.eq(meeting))).execute(conn)?;
    let hw_ids = homework::table
        .filter(homework::meeting_id.eq(meeting))
        .select(homework::id)
        .load::<i32>(conn)?;
    let _ = delete(student_homework::table.filter(student_homework::homework_id.eq_any(hw_ids)))
        .execute(conn)?;
    let _ = delete(homework::table.filter(homework::meeting_id.eq(meeting))).execute(conn)?;
    Ok(())
}

#[derive(Debug)]
struct Pragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[cfg(test)]
mod tests;
